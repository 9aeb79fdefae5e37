//! Family A: risky pointer patterns inside loop bodies.
//!
//! Fires once per evaluated conditional expression. When the condition
//! belongs to an iterator statement, the loop body's top-level statements are
//! scanned for declarations initialized from a double dereference,
//! assignments of a double dereference, and reassignments that chase the loop
//! variable through its own pointer field (the classic linked-list walk).
//! Two weaker text heuristics run alongside the structural checks; each one
//! is independently toggleable and a heuristic that cannot compile its
//! pattern is skipped without aborting the scan.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{Expr, ExprId, Namespace, ParentIndex, Stmt, StmtId, Unit, UnaryOp};
use crate::{AnalysisContext, Check, CheckMetadata, Finding, FindingKind, Severity};

/// Arrow, one-or-more non-comma/non-space characters, arrow (`a->b->c`).
/// `None` when the pattern does not compile; the heuristic then declines.
static ARROW_CHAIN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"->[^,\s]+->").ok());

pub struct LoopDerefCheck {
    metadata: CheckMetadata,
}

impl LoopDerefCheck {
    pub fn new() -> Self {
        Self {
            metadata: CheckMetadata {
                id: "SPECLINT001".to_string(),
                name: "loop-pointer-deref".to_string(),
                short_description: "Double dereference or pointer chasing in a loop body"
                    .to_string(),
                full_description: "Scans iterator bodies for declarations and assignments \
                                   built from double pointer dereferences and for loop \
                                   variables reassigned through their own pointer fields, \
                                   which usually indicates a linked-list traversal."
                    .to_string(),
                default_severity: Severity::Medium,
            },
        }
    }

    fn finding(&self, kind: FindingKind, message: String, expr: String) -> Finding {
        Finding {
            check_id: self.metadata.id.clone(),
            check_name: self.metadata.name.clone(),
            severity: self.metadata.default_severity,
            kind,
            message,
            expr,
            access: None,
            guarded: false,
        }
    }

    fn scan_statement(
        &self,
        unit: &Unit,
        cx: &mut AnalysisContext,
        stmt: StmtId,
        loop_var: Option<&str>,
    ) {
        match unit.stmt(stmt) {
            Stmt::Declaration { symbols } => {
                let mut texts = Vec::new();
                for sym in symbols {
                    if sym.namespace != Namespace::Ordinary {
                        continue;
                    }
                    let Some(init) = sym.initializer else { continue };
                    if is_double_deref(unit, init) {
                        let text = unit.expr_to_str(init);
                        cx.push_finding(self.finding(
                            FindingKind::DoubleDeref,
                            format!("found double pointer deref in iterating loop: {text}"),
                            text,
                        ));
                    }
                    if loop_var.is_some() {
                        texts.push(unit.expr_to_str(init));
                    }
                }
                // Multi-declarator statements contribute one rendered text
                // per initializer but count as a single statement.
                self.text_heuristics(cx, &texts);
            }
            Stmt::Expression { expr } => {
                let expr = unit.strip_parens(*expr);
                let Some(var) = loop_var else { return };

                if let Expr::Assign { left, right } = unit.expr(expr) {
                    let rhs = unit.strip_parens(*right);
                    if is_double_deref(unit, rhs) {
                        let text = unit.expr_to_str(expr);
                        cx.push_finding(self.finding(
                            FindingKind::DerefAssign,
                            format!(
                                "found pointer double deref in while loop (assign to **): {text}"
                            ),
                            text,
                        ));
                    }
                    if symbol_name(unit, *left).as_deref() == Some(var)
                        && is_chase_of(unit, rhs, var)
                    {
                        let text = unit.expr_to_str(expr);
                        cx.push_finding(self.finding(
                            FindingKind::PointerChase,
                            format!(
                                "found pointer chasing in loop variable (linked list traversal): {text}"
                            ),
                            text,
                        ));
                    }
                }

                self.text_heuristics(cx, &[unit.expr_to_str(expr)]);
            }
            _ => {}
        }
    }

    /// Text-level signals over the rendered statement texts. These fire
    /// regardless of true pointer-ness; that is a documented false-positive
    /// source. Each heuristic reports at most once per statement.
    fn text_heuristics(&self, cx: &mut AnalysisContext, texts: &[String]) {
        if cx.config.double_star_heuristic {
            if let Some(text) = texts.iter().find(|t| t.contains("**")) {
                cx.push_finding(self.finding(
                    FindingKind::TextDoubleStar,
                    format!("found pointer double deref in while loop (**): {text}"),
                    text.clone(),
                ));
            }
        }

        if cx.config.arrow_chain_heuristic {
            if let Some(pattern) = ARROW_CHAIN.as_ref() {
                if let Some(text) = texts.iter().find(|t| pattern.is_match(t)) {
                    cx.push_finding(self.finding(
                        FindingKind::TextArrowChain,
                        format!("found pointer double deref in while loop (->->): {text}"),
                        text.clone(),
                    ));
                }
            }
        }
    }
}

impl Default for LoopDerefCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Check for LoopDerefCheck {
    fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    fn on_condition(
        &self,
        unit: &Unit,
        parents: &ParentIndex,
        cx: &mut AnalysisContext,
        expr: ExprId,
    ) {
        let trigger = unit.strip_parens(expr);
        // The front end may fire on the full condition or on one of its
        // operands; either way we want the complete conditional expression.
        // Climbing one level can land back on a paren wrapper, so strip
        // again before matching.
        let enclosing = unit.strip_parens(parents.parent_expr(trigger).unwrap_or(trigger));

        let Some(stmt) = parents.parent_stmt(enclosing) else { return };
        let Stmt::Iterator { body, .. } = unit.stmt(stmt) else { return };

        // Resolve the loop variable from a single comparison (compound
        // for-loop headers fall back to the declaration-only scan).
        let loop_var = match unit.expr(enclosing) {
            Expr::Compare { left, right, .. } => {
                match symbol_name(unit, *left).or_else(|| symbol_name(unit, *right)) {
                    Some(name) => Some(name),
                    // A comparison with no plain symbol operand: nothing to
                    // track, skip the loop entirely.
                    None => return,
                }
            }
            Expr::Symbol { name } => Some(name.clone()),
            _ => None,
        };

        for &inner in body {
            self.scan_statement(unit, cx, inner, loop_var.as_deref());
        }
    }
}

/// `*(*X)` / `**X` / `*(&X)`: a unary dereference whose (paren-stripped)
/// operand is itself a unary prefix expression.
fn is_double_deref(unit: &Unit, expr: ExprId) -> bool {
    let expr = unit.strip_parens(expr);
    let Expr::Unary {
        op: UnaryOp::Deref,
        operand,
    } = unit.expr(expr)
    else {
        return false;
    };
    matches!(unit.expr(unit.strip_parens(*operand)), Expr::Unary { .. })
}

/// `var->field` or `(*var).field`: the loop variable chased through one of
/// its own pointer fields.
fn is_chase_of(unit: &Unit, expr: ExprId, var: &str) -> bool {
    let Expr::Member { base, arrow, .. } = unit.expr(unit.strip_parens(expr)) else {
        return false;
    };
    let base = unit.strip_parens(*base);
    match unit.expr(base) {
        Expr::Symbol { name } => *arrow && name == var,
        Expr::Unary {
            op: UnaryOp::Deref,
            operand,
        } => symbol_name(unit, *operand).as_deref() == Some(var),
        _ => false,
    }
}

fn symbol_name(unit: &Unit, expr: ExprId) -> Option<String> {
    match unit.expr(unit.strip_parens(expr)) {
        Expr::Symbol { name } => Some(name.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, CompareOp, Namespace, SymbolDecl};
    use crate::{AnalysisConfig, CheckEngine};

    fn sym(unit: &mut Unit, name: &str) -> ExprId {
        unit.add_expr(Expr::Symbol {
            name: name.to_string(),
        })
    }

    fn deref(unit: &mut Unit, operand: ExprId) -> ExprId {
        unit.add_expr(Expr::Unary {
            op: UnaryOp::Deref,
            operand,
        })
    }

    /// Build `while (<cond>) { <body> }` and return the loop statement.
    fn while_loop(unit: &mut Unit, cond: ExprId, body: Vec<StmtId>) -> StmtId {
        let stmt = unit.add_stmt(Stmt::Iterator {
            pre_condition: Some(cond),
            post_condition: None,
            body,
        });
        unit.push_top_level(stmt);
        stmt
    }

    fn ne_null(unit: &mut Unit, name: &str) -> ExprId {
        let left = sym(unit, name);
        let right = unit.add_expr(Expr::IntLiteral { value: 0 });
        unit.add_expr(Expr::Compare {
            op: CompareOp::Ne,
            left,
            right,
        })
    }

    fn run(unit: &Unit) -> Vec<Finding> {
        let engine = CheckEngine::with_builtin_checks();
        engine.run(unit, &AnalysisConfig::default()).findings
    }

    fn run_with(unit: &Unit, config: &AnalysisConfig) -> Vec<Finding> {
        let engine = CheckEngine::with_builtin_checks();
        engine.run(unit, config).findings
    }

    #[test]
    fn test_double_deref_declaration_in_loop() {
        // while (p != 0) { T *v = *(*p); }
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "p");
        let p = sym(&mut unit, "p");
        let inner = deref(&mut unit, p);
        let paren = unit.add_expr(Expr::Paren { inner });
        let init = deref(&mut unit, paren);
        let decl = unit.add_stmt(Stmt::Declaration {
            symbols: vec![SymbolDecl {
                name: "v".to_string(),
                namespace: Namespace::Ordinary,
                initializer: Some(init),
            }],
        });
        while_loop(&mut unit, cond, vec![decl]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::DoubleDeref);
        assert_eq!(
            findings[0].message,
            "found double pointer deref in iterating loop: *(*p)"
        );
    }

    #[test]
    fn test_deref_of_address_of_counts_as_double_deref() {
        // while (node != 0) { int *d = *(&node->data); }
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "node");
        let node = sym(&mut unit, "node");
        let data = unit.add_expr(Expr::Member {
            base: node,
            field: "data".to_string(),
            arrow: true,
        });
        let addr = unit.add_expr(Expr::Unary {
            op: UnaryOp::AddressOf,
            operand: data,
        });
        let paren = unit.add_expr(Expr::Paren { inner: addr });
        let init = deref(&mut unit, paren);
        let decl = unit.add_stmt(Stmt::Declaration {
            symbols: vec![SymbolDecl {
                name: "d".to_string(),
                namespace: Namespace::Ordinary,
                initializer: Some(init),
            }],
        });
        while_loop(&mut unit, cond, vec![decl]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "found double pointer deref in iterating loop: *(&node->data)"
        );
    }

    #[test]
    fn test_pointer_chase_on_loop_variable() {
        // while (p != 0) { p = p->next; }
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "p");
        let lhs = sym(&mut unit, "p");
        let base = sym(&mut unit, "p");
        let next = unit.add_expr(Expr::Member {
            base,
            field: "next".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: next,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::PointerChase);
        assert_eq!(
            findings[0].message,
            "found pointer chasing in loop variable (linked list traversal): p = p->next"
        );
    }

    #[test]
    fn test_bare_symbol_condition_resolves_loop_variable() {
        // while (node) { node = node->next; }
        let mut unit = Unit::new();
        let cond = sym(&mut unit, "node");
        let lhs = sym(&mut unit, "node");
        let base = sym(&mut unit, "node");
        let next = unit.add_expr(Expr::Member {
            base,
            field: "next".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: next,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::PointerChase);
    }

    #[test]
    fn test_chase_through_explicit_deref_shape() {
        // while (p != 0) { p = (*p).next; }
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "p");
        let lhs = sym(&mut unit, "p");
        let base = sym(&mut unit, "p");
        let deref_p = deref(&mut unit, base);
        let paren = unit.add_expr(Expr::Paren { inner: deref_p });
        let next = unit.add_expr(Expr::Member {
            base: paren,
            field: "next".to_string(),
            arrow: false,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: next,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::PointerChase);
    }

    #[test]
    fn test_assignment_of_double_deref_uses_assign_message() {
        // while (p != 0) { x = *(*q); }
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "p");
        let lhs = sym(&mut unit, "x");
        let q = sym(&mut unit, "q");
        let inner = deref(&mut unit, q);
        let paren = unit.add_expr(Expr::Paren { inner });
        let rhs = deref(&mut unit, paren);
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: rhs,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::DerefAssign);
        assert_eq!(
            findings[0].message,
            "found pointer double deref in while loop (assign to **): x = *(*q)"
        );
    }

    #[test]
    fn test_double_star_text_heuristic_without_pointers() {
        // while (i != 0) { x = **q; } rendered text contains `**` and both
        // the structural assign check and the text heuristic fire.
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "i");
        let lhs = sym(&mut unit, "x");
        let q = sym(&mut unit, "q");
        let inner = deref(&mut unit, q);
        let rhs = deref(&mut unit, inner);
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: rhs,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let findings = run(&unit);
        let kinds: Vec<FindingKind> = findings.iter().map(|f| f.kind).collect();
        assert!(kinds.contains(&FindingKind::DerefAssign));
        assert!(kinds.contains(&FindingKind::TextDoubleStar));
        let text = findings
            .iter()
            .find(|f| f.kind == FindingKind::TextDoubleStar)
            .unwrap();
        assert_eq!(
            text.message,
            "found pointer double deref in while loop (**): x = **q"
        );
    }

    #[test]
    fn test_arrow_chain_text_heuristic() {
        // while (p != 0) { x = a->b->c; }
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "p");
        let lhs = sym(&mut unit, "x");
        let a = sym(&mut unit, "a");
        let ab = unit.add_expr(Expr::Member {
            base: a,
            field: "b".to_string(),
            arrow: true,
        });
        let abc = unit.add_expr(Expr::Member {
            base: ab,
            field: "c".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: abc,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::TextArrowChain);
        assert_eq!(
            findings[0].message,
            "found pointer double deref in while loop (->->): x = a->b->c"
        );
    }

    #[test]
    fn test_text_heuristics_can_be_disabled() {
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "p");
        let lhs = sym(&mut unit, "x");
        let a = sym(&mut unit, "a");
        let ab = unit.add_expr(Expr::Member {
            base: a,
            field: "b".to_string(),
            arrow: true,
        });
        let abc = unit.add_expr(Expr::Member {
            base: ab,
            field: "c".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: abc,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let config = AnalysisConfig {
            double_star_heuristic: false,
            arrow_chain_heuristic: false,
            ..AnalysisConfig::default()
        };
        assert!(run_with(&unit, &config).is_empty());
    }

    #[test]
    fn test_compound_header_keeps_declaration_scan_only() {
        // while (p != 0 && q != 0) { T *v = *(*p); p = p->next; }
        // Compound header: double-deref declarations are still reported, but
        // no loop variable is tracked, so the chase goes unreported.
        let mut unit = Unit::new();
        let left = ne_null(&mut unit, "p");
        let right = ne_null(&mut unit, "q");
        let cond = unit.add_expr(Expr::Binary {
            op: BinaryOp::LogicalAnd,
            left,
            right,
        });

        let p = sym(&mut unit, "p");
        let inner = deref(&mut unit, p);
        let paren = unit.add_expr(Expr::Paren { inner });
        let init = deref(&mut unit, paren);
        let decl = unit.add_stmt(Stmt::Declaration {
            symbols: vec![SymbolDecl {
                name: "v".to_string(),
                namespace: Namespace::Ordinary,
                initializer: Some(init),
            }],
        });

        let lhs = sym(&mut unit, "p");
        let base = sym(&mut unit, "p");
        let next = unit.add_expr(Expr::Member {
            base,
            field: "next".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: next,
        });
        let chase = unit.add_stmt(Stmt::Expression { expr: assign });

        while_loop(&mut unit, cond, vec![decl, chase]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::DoubleDeref);
    }

    #[test]
    fn test_comparison_without_symbol_operand_skips_loop() {
        // while (f() != g()) { T *v = *(*p); } — no plain symbol operand, the
        // matcher declines entirely.
        let mut unit = Unit::new();
        let f = sym(&mut unit, "f");
        let left = unit.add_expr(Expr::Call {
            callee: f,
            args: vec![],
        });
        let g = sym(&mut unit, "g");
        let right = unit.add_expr(Expr::Call {
            callee: g,
            args: vec![],
        });
        let cond = unit.add_expr(Expr::Compare {
            op: CompareOp::Ne,
            left,
            right,
        });

        let p = sym(&mut unit, "p");
        let inner = deref(&mut unit, p);
        let paren = unit.add_expr(Expr::Paren { inner });
        let init = deref(&mut unit, paren);
        let decl = unit.add_stmt(Stmt::Declaration {
            symbols: vec![SymbolDecl {
                name: "v".to_string(),
                namespace: Namespace::Ordinary,
                initializer: Some(init),
            }],
        });
        while_loop(&mut unit, cond, vec![decl]);

        assert!(run(&unit).is_empty());
    }

    #[test]
    fn test_if_condition_is_not_a_loop() {
        // if (p != 0) { p = p->next; } — not an iterator, no findings.
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "p");
        let lhs = sym(&mut unit, "p");
        let base = sym(&mut unit, "p");
        let next = unit.add_expr(Expr::Member {
            base,
            field: "next".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: next,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        let stmt = unit.add_stmt(Stmt::If {
            condition: cond,
            then_body: vec![body],
            else_body: vec![],
        });
        unit.push_top_level(stmt);

        assert!(run(&unit).is_empty());
    }

    #[test]
    fn test_condition_event_on_comparison_operand() {
        // The front end may fire the condition event on an operand of the
        // comparison; the matcher walks up to the enclosing expression.
        let mut unit = Unit::new();
        let p = sym(&mut unit, "p");
        let zero = unit.add_expr(Expr::IntLiteral { value: 0 });
        let cond = unit.add_expr(Expr::Compare {
            op: CompareOp::Ne,
            left: p,
            right: zero,
        });
        let lhs = sym(&mut unit, "p");
        let base = sym(&mut unit, "p");
        let next = unit.add_expr(Expr::Member {
            base,
            field: "next".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: next,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        let stmt = unit.add_stmt(Stmt::Iterator {
            pre_condition: Some(cond),
            post_condition: None,
            body: vec![body],
        });
        unit.push_top_level(stmt);

        let parents = ParentIndex::build(&unit);
        let config = AnalysisConfig::default();
        let mut cx = AnalysisContext::new(&config);
        let check = LoopDerefCheck::new();
        check.on_condition(&unit, &parents, &mut cx, p);

        assert_eq!(cx.findings().len(), 1);
        assert_eq!(cx.findings()[0].kind, FindingKind::PointerChase);
    }

    #[test]
    fn test_paren_wrapped_condition_still_resolves_loop_variable() {
        // while ((p != 0)) { p = p->next; } — climbing from the stripped
        // trigger lands on the paren wrapper, which must not defeat the
        // loop-variable match.
        let mut unit = Unit::new();
        let cmp = ne_null(&mut unit, "p");
        let cond = unit.add_expr(Expr::Paren { inner: cmp });
        let lhs = sym(&mut unit, "p");
        let base = sym(&mut unit, "p");
        let next = unit.add_expr(Expr::Member {
            base,
            field: "next".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: next,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::PointerChase);
        assert_eq!(
            findings[0].message,
            "found pointer chasing in loop variable (linked list traversal): p = p->next"
        );
    }

    #[test]
    fn test_paren_wrapped_bare_symbol_condition() {
        // while ((node)) { node = node->next; }
        let mut unit = Unit::new();
        let node = sym(&mut unit, "node");
        let cond = unit.add_expr(Expr::Paren { inner: node });
        let lhs = sym(&mut unit, "node");
        let base = sym(&mut unit, "node");
        let next = unit.add_expr(Expr::Member {
            base,
            field: "next".to_string(),
            arrow: true,
        });
        let assign = unit.add_expr(Expr::Assign {
            left: lhs,
            right: next,
        });
        let body = unit.add_stmt(Stmt::Expression { expr: assign });
        while_loop(&mut unit, cond, vec![body]);

        let findings = run(&unit);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::PointerChase);
    }

    #[test]
    fn test_multi_declarator_statement_fires_heuristic_once() {
        // while (p != 0) { T *a = **q, *b = **r; } — a structural finding
        // per declarator, one `**` text finding for the whole statement.
        let mut unit = Unit::new();
        let cond = ne_null(&mut unit, "p");
        let q = sym(&mut unit, "q");
        let q_inner = deref(&mut unit, q);
        let q_init = deref(&mut unit, q_inner);
        let r = sym(&mut unit, "r");
        let r_inner = deref(&mut unit, r);
        let r_init = deref(&mut unit, r_inner);
        let decl = unit.add_stmt(Stmt::Declaration {
            symbols: vec![
                SymbolDecl {
                    name: "a".to_string(),
                    namespace: Namespace::Ordinary,
                    initializer: Some(q_init),
                },
                SymbolDecl {
                    name: "b".to_string(),
                    namespace: Namespace::Ordinary,
                    initializer: Some(r_init),
                },
            ],
        });
        while_loop(&mut unit, cond, vec![decl]);

        let findings = run(&unit);
        let structural = findings
            .iter()
            .filter(|f| f.kind == FindingKind::DoubleDeref)
            .count();
        let text = findings
            .iter()
            .filter(|f| f.kind == FindingKind::TextDoubleStar)
            .count();
        assert_eq!(structural, 2);
        assert_eq!(text, 1);
    }
}
