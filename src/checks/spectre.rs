//! Family B: array accesses usable as speculative-execution gadgets.
//!
//! Fires once per evaluated operation expression. An array access survives a
//! gauntlet of eliminations (wrong kind, infeasible path, harmless guard
//! position, suppression, speculation barrier, type-max bound, bit-mask
//! bound) before it is reported. Bound and mask information is propagated
//! along the front end's assigned-expression chains with small hop limits;
//! everything here is deliberately heuristic and intraprocedural.

use crate::ast::{BinaryOp, Expr, ExprId, ParentIndex, Stmt, Unit};
use crate::{
    AccessKind, AnalysisContext, Check, CheckMetadata, Finding, FindingKind, Severity,
};

pub struct SpectreIndexCheck {
    metadata: CheckMetadata,
}

impl SpectreIndexCheck {
    pub fn new() -> Self {
        Self {
            metadata: CheckMetadata {
                id: "SPECLINT002".to_string(),
                name: "spectre-array-index".to_string(),
                short_description: "Array access with an index that is not provably bounded"
                    .to_string(),
                full_description: "Reports array-element accesses whose index is neither \
                                   confined by its static type's maximum nor by a bitwise \
                                   mask, and which sit on a feasible path outside a guard \
                                   position. Such accesses can disclose memory contents \
                                   under speculative execution."
                    .to_string(),
                default_severity: Severity::High,
            },
        }
    }

    fn array_check(
        &self,
        unit: &Unit,
        parents: &ParentIndex,
        cx: &mut AnalysisContext,
        expr: ExprId,
    ) {
        let expr = unit.strip_parens(expr);
        let Expr::Index { base, offset } = *unit.expr(expr) else {
            return;
        };

        if unit.is_infeasible(expr) {
            return;
        }
        if is_harmless(unit, parents, expr) {
            return;
        }

        let base = unit.strip_parens(base);
        let base_name = unit.expr_to_str(base);
        if cx.config.suppress_multiple && cx.base_already_reported(&base_name) {
            // Already reported for this base in this unit: leave only the
            // correlation marker for the paired second-half check.
            cx.set_first_half(expr);
            return;
        }

        if unit.has_barrier(offset) {
            return;
        }

        let extent = unit.array_extent(base);
        if let Some(size) = extent {
            if size > 0 && get_max_by_type(unit, offset) < size {
                return;
            }
        }
        if get_mask(unit, offset) <= extent.unwrap_or(0) {
            return;
        }

        // Guard conditions on the index never suppress; they only annotate.
        let guarded = !unit.guard_conditions(offset).is_empty();
        let access = if is_read(unit, parents, expr) {
            AccessKind::Read
        } else {
            AccessKind::Write
        };

        cx.push_finding(Finding {
            check_id: self.metadata.id.clone(),
            check_name: self.metadata.name.clone(),
            severity: self.metadata.default_severity,
            kind: FindingKind::SpectreArray,
            message: format!(
                "potential spectre issue '{}' [{}]{}",
                base_name,
                access.letter(),
                if guarded { " (local cap)" } else { "" }
            ),
            expr: base_name.clone(),
            access: Some(access),
            guarded,
        });

        cx.set_first_half(expr);
        if cx.config.suppress_multiple {
            cx.mark_base_reported(base_name);
        }
    }
}

impl Default for SpectreIndexCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Check for SpectreIndexCheck {
    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    fn on_operation(
        &self,
        unit: &Unit,
        parents: &ParentIndex,
        cx: &mut AnalysisContext,
        expr: ExprId,
    ) {
        self.array_check(unit, parents, cx, expr);
    }
}

/// Write detection is a known stub: nothing is ever classified as a write
/// here, so the read/write letter is decided by `is_read` alone.
fn is_write(_unit: &Unit, _expr: ExprId) -> bool {
    false
}

/// Walk the ancestors: the right side of the nearest assignment is a read,
/// the left side is not. With no assignment ancestor, an expression feeding
/// a return statement is a read.
fn is_read(unit: &Unit, parents: &ParentIndex, expr: ExprId) -> bool {
    if is_write(unit, expr) {
        return false;
    }

    let mut current = expr;
    let mut last = expr;
    while let Some(parent) = parents.parent_expr(current) {
        last = parent;
        if let Expr::Assign { left, right } = unit.expr(parent) {
            if *right == current {
                return true;
            }
            if *left == current {
                return false;
            }
        }
        current = parent;
    }

    match parents.parent_stmt(last) {
        Some(stmt) => matches!(unit.stmt(stmt), Stmt::Return { .. }),
        None => false,
    }
}

/// An access that is itself the guard of an `if` or loop cannot leak what it
/// speculatively read. Walks at most 5 ancestor expressions; any intervening
/// assignment or call makes the access interesting again.
fn is_harmless(unit: &Unit, parents: &ParentIndex, expr: ExprId) -> bool {
    let mut top = expr;
    let mut count = 0;
    while let Some(parent) = parents.parent_expr(top) {
        if matches!(unit.expr(parent), Expr::Assign { .. } | Expr::Call { .. }) {
            return false;
        }
        top = parent;
        count += 1;
        if count > 4 {
            break;
        }
    }

    let Some(stmt) = parents.parent_stmt(top) else {
        return false;
    };
    match unit.stmt(stmt) {
        Stmt::If { condition, .. } => *condition == top,
        Stmt::Iterator {
            pre_condition,
            post_condition,
            ..
        } => *pre_condition == Some(top) || *post_condition == Some(top),
        _ => false,
    }
}

/// Smallest maximum value the index can statically hold. Keeps the running
/// minimum of the type maxima seen while unwrapping: into unary operands,
/// along the right side of `%` and `&`, or through the expression the
/// variable was assigned from. At most 6 hops.
pub(crate) fn get_max_by_type(unit: &Unit, expr: ExprId) -> u64 {
    let mut max = u64::MAX;
    let mut expr = expr;
    let mut hops = 0;

    loop {
        expr = unit.strip_parens(expr);
        if let Some(ty) = unit.expr_type(expr) {
            max = max.min(ty.max_value());
        }

        expr = match unit.expr(expr) {
            Expr::Unary { operand, .. } => *operand,
            Expr::Binary { op, right, .. } => match op {
                BinaryOp::Mod | BinaryOp::BitAnd => *right,
                _ => return max,
            },
            _ => match unit.assigned_expr(expr) {
                Some(assigned) => assigned,
                None => return max,
            },
        };

        hops += 1;
        if hops > 5 {
            return max;
        }
    }
}

/// Constant bit mask confining the index, if the assignment chain (at most 3
/// hops) ends in a bitwise-AND with a compile-time constant operand. The
/// right operand is the common spelling and is preferred.
pub(crate) fn get_mask(unit: &Unit, expr: ExprId) -> u64 {
    let mut expr = unit.strip_parens(expr);
    let mut hops = 0;

    while let Some(assigned) = unit.assigned_expr(expr) {
        expr = assigned;
        hops += 1;
        if hops > 3 {
            break;
        }
    }

    if let Expr::Binary {
        op: BinaryOp::BitAnd,
        left,
        right,
    } = unit.expr(unit.strip_parens(expr))
    {
        if let Some(mask) = unit.const_value(*right) {
            return mask;
        }
        if let Some(mask) = unit.const_value(*left) {
            return mask;
        }
    }

    u64::MAX
}
