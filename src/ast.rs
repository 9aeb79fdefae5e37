//! Expression/statement tree model consumed by the checks.
//!
//! The front end (parser, symbol tables, type inference) lives outside this
//! crate; it hands us a `Unit` holding arena-allocated expressions and
//! statements plus the fact tables the checks query (static types, array
//! extents, assigned expressions, path feasibility, speculation barriers).
//! Parent links are never stored in the nodes themselves: `ParentIndex` is a
//! computed relation built once per unit.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Handle into the expression arena of a `Unit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

/// Handle into the statement arena of a `Unit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StmtId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Deref,
    AddressOf,
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Deref => "*",
            UnaryOp::AddressOf => "&",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

/// Expression node. Operands are arena handles; the syntactic parent is
/// computed via `ParentIndex`, not stored here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Symbol { name: String },
    IntLiteral { value: u64 },
    Compare { op: CompareOp, left: ExprId, right: ExprId },
    Assign { left: ExprId, right: ExprId },
    Unary { op: UnaryOp, operand: ExprId },
    Binary { op: BinaryOp, left: ExprId, right: ExprId },
    Member { base: ExprId, field: String, arrow: bool },
    Index { base: ExprId, offset: ExprId },
    Call { callee: ExprId, args: Vec<ExprId> },
    /// Explicit parenthesisation kept by the front end.
    Paren { inner: ExprId },
    /// Wrapper left behind after preprocessor/macro expansion.
    Expanded { inner: ExprId },
}

impl Expr {
    /// Operand handles in syntactic order.
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Symbol { .. } | Expr::IntLiteral { .. } => Vec::new(),
            Expr::Compare { left, right, .. }
            | Expr::Assign { left, right }
            | Expr::Binary { left, right, .. } => vec![*left, *right],
            Expr::Unary { operand, .. } => vec![*operand],
            Expr::Member { base, .. } => vec![*base],
            Expr::Index { base, offset } => vec![*base, *offset],
            Expr::Call { callee, args } => {
                let mut out = vec![*callee];
                out.extend(args.iter().copied());
                out
            }
            Expr::Paren { inner } | Expr::Expanded { inner } => vec![*inner],
        }
    }
}

/// Symbol namespace as reported by the front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Ordinary,
    Typedef,
    Label,
}

/// One declared name inside a declaration statement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolDecl {
    pub name: String,
    pub namespace: Namespace,
    pub initializer: Option<ExprId>,
}

/// Statement node. An iterator statement owns its body statement sequence
/// plus the pre-/post-condition expressions (while vs. do-while).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Declaration {
        symbols: Vec<SymbolDecl>,
    },
    Expression {
        expr: ExprId,
    },
    Iterator {
        pre_condition: Option<ExprId>,
        post_condition: Option<ExprId>,
        body: Vec<StmtId>,
    },
    If {
        condition: ExprId,
        then_body: Vec<StmtId>,
        else_body: Vec<StmtId>,
    },
    Return {
        value: Option<ExprId>,
    },
    Block {
        body: Vec<StmtId>,
    },
}

impl Stmt {
    /// Expressions directly owned by this statement (not the ones nested
    /// inside them).
    pub fn root_exprs(&self) -> Vec<ExprId> {
        match self {
            Stmt::Declaration { symbols } => {
                symbols.iter().filter_map(|s| s.initializer).collect()
            }
            Stmt::Expression { expr } => vec![*expr],
            Stmt::Iterator {
                pre_condition,
                post_condition,
                ..
            } => pre_condition
                .iter()
                .chain(post_condition.iter())
                .copied()
                .collect(),
            Stmt::If { condition, .. } => vec![*condition],
            Stmt::Return { value } => value.iter().copied().collect(),
            Stmt::Block { .. } => Vec::new(),
        }
    }
}

/// Static scalar type of an expression, as resolved by the front end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Ptr,
}

impl ScalarType {
    /// Maximum representable value, widened to u64.
    pub fn max_value(&self) -> u64 {
        match self {
            ScalarType::Bool => 1,
            ScalarType::U8 => u8::MAX as u64,
            ScalarType::U16 => u16::MAX as u64,
            ScalarType::U32 => u32::MAX as u64,
            ScalarType::U64 | ScalarType::Ptr => u64::MAX,
            ScalarType::I8 => i8::MAX as u64,
            ScalarType::I16 => i16::MAX as u64,
            ScalarType::I32 => i32::MAX as u64,
            ScalarType::I64 => i64::MAX as u64,
        }
    }
}

/// One translation unit: the statement/expression arenas plus the fact
/// tables delivered by the front end. Checks only ever read from it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Unit {
    exprs: Vec<Expr>,
    stmts: Vec<Stmt>,
    top_level: Vec<StmtId>,
    #[serde(default)]
    types: HashMap<ExprId, ScalarType>,
    #[serde(default)]
    array_extents: HashMap<String, u64>,
    #[serde(default)]
    assigned: HashMap<String, ExprId>,
    #[serde(default)]
    infeasible: HashSet<ExprId>,
    #[serde(default)]
    barriers: HashSet<ExprId>,
    #[serde(default)]
    guards: HashMap<ExprId, Vec<ExprId>>,
}

impl Unit {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- construction (front-end surface) ----

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn add_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }

    pub fn push_top_level(&mut self, stmt: StmtId) {
        self.top_level.push(stmt);
    }

    pub fn set_type(&mut self, expr: ExprId, ty: ScalarType) {
        self.types.insert(expr, ty);
    }

    /// Declared element count of the named array.
    pub fn set_array_extent(&mut self, base_name: &str, extent: u64) {
        self.array_extents.insert(base_name.to_string(), extent);
    }

    /// Most recent syntactic assignment's right-hand side for a variable.
    pub fn set_assigned(&mut self, name: &str, rhs: ExprId) {
        self.assigned.insert(name.to_string(), rhs);
    }

    /// Mark an access as sitting on a statically infeasible path.
    pub fn mark_infeasible(&mut self, expr: ExprId) {
        self.infeasible.insert(expr);
    }

    /// Mark an index expression as passing through a speculation barrier.
    pub fn mark_barrier(&mut self, expr: ExprId) {
        self.barriers.insert(expr);
    }

    /// Record a branch condition guarding the given index expression.
    pub fn add_guard(&mut self, offset: ExprId, condition: ExprId) {
        self.guards.entry(offset).or_default().push(condition);
    }

    /// Verify every stored handle points into the arenas. Units built
    /// through the `add_*` methods always pass; deserialized ones may carry
    /// dangling ids, and the query methods index without bounds checks.
    pub fn validate(&self) -> Result<()> {
        let expr_count = self.exprs.len();
        let stmt_count = self.stmts.len();
        let check_expr = |id: ExprId| -> Result<()> {
            if (id.0 as usize) >= expr_count {
                bail!("expression id {} out of range (unit has {expr_count} expressions)", id.0);
            }
            Ok(())
        };
        let check_stmt = |id: StmtId| -> Result<()> {
            if (id.0 as usize) >= stmt_count {
                bail!("statement id {} out of range (unit has {stmt_count} statements)", id.0);
            }
            Ok(())
        };

        for expr in &self.exprs {
            for child in expr.children() {
                check_expr(child)?;
            }
        }
        for stmt in &self.stmts {
            for root in stmt.root_exprs() {
                check_expr(root)?;
            }
            match stmt {
                Stmt::Iterator { body, .. } | Stmt::Block { body } => {
                    for &inner in body {
                        check_stmt(inner)?;
                    }
                }
                Stmt::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    for &inner in then_body.iter().chain(else_body) {
                        check_stmt(inner)?;
                    }
                }
                _ => {}
            }
        }
        for &stmt in &self.top_level {
            check_stmt(stmt)?;
        }
        for &rhs in self.assigned.values() {
            check_expr(rhs)?;
        }
        for (&offset, conditions) in &self.guards {
            check_expr(offset)?;
            for &condition in conditions {
                check_expr(condition)?;
            }
        }
        Ok(())
    }

    // ---- queries (capability contract consumed by the checks) ----

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn top_level(&self) -> &[StmtId] {
        &self.top_level
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    pub fn stmt_count(&self) -> usize {
        self.stmts.len()
    }

    /// Strip redundant parenthesisation and preprocessor wrappers.
    pub fn strip_parens(&self, mut id: ExprId) -> ExprId {
        loop {
            match self.expr(id) {
                Expr::Paren { inner } | Expr::Expanded { inner } => id = *inner,
                _ => return id,
            }
        }
    }

    pub fn expr_type(&self, id: ExprId) -> Option<ScalarType> {
        self.types.get(&id).copied()
    }

    /// Attempt to reduce an expression to a compile-time constant.
    pub fn const_value(&self, id: ExprId) -> Option<u64> {
        let id = self.strip_parens(id);
        match self.expr(id) {
            Expr::IntLiteral { value } => Some(*value),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.const_value(*operand).map(|v| (v == 0) as u64),
            Expr::Binary { op, left, right } => {
                let l = self.const_value(*left)?;
                let r = self.const_value(*right)?;
                match op {
                    BinaryOp::Add => Some(l.wrapping_add(r)),
                    BinaryOp::Sub => Some(l.wrapping_sub(r)),
                    BinaryOp::Mul => Some(l.wrapping_mul(r)),
                    BinaryOp::Div => l.checked_div(r),
                    BinaryOp::Mod => l.checked_rem(r),
                    BinaryOp::BitAnd => Some(l & r),
                    BinaryOp::BitOr => Some(l | r),
                    BinaryOp::BitXor => Some(l ^ r),
                    BinaryOp::Shl => l.checked_shl(r as u32),
                    BinaryOp::Shr => l.checked_shr(r as u32),
                    BinaryOp::LogicalAnd | BinaryOp::LogicalOr => None,
                }
            }
            _ => None,
        }
    }

    /// Static extent of the array behind a base expression, if known.
    pub fn array_extent(&self, base: ExprId) -> Option<u64> {
        let name = self.expr_to_str(self.strip_parens(base));
        self.array_extents.get(&name).copied()
    }

    /// Expression most recently assigned to a variable reference.
    pub fn assigned_expr(&self, id: ExprId) -> Option<ExprId> {
        match self.expr(self.strip_parens(id)) {
            Expr::Symbol { name } => self.assigned.get(name).copied(),
            _ => None,
        }
    }

    pub fn is_infeasible(&self, id: ExprId) -> bool {
        self.infeasible.contains(&id) || self.infeasible.contains(&self.strip_parens(id))
    }

    pub fn has_barrier(&self, id: ExprId) -> bool {
        self.barriers.contains(&id) || self.barriers.contains(&self.strip_parens(id))
    }

    pub fn guard_conditions(&self, offset: ExprId) -> &[ExprId] {
        self.guards.get(&offset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Textual rendering of an expression, used for diagnostic messages.
    /// Parens appear only where `Paren` nodes exist, so `*(*p)` and `**p`
    /// stay distinguishable.
    pub fn expr_to_str(&self, id: ExprId) -> String {
        match self.expr(id) {
            Expr::Symbol { name } => name.clone(),
            Expr::IntLiteral { value } => value.to_string(),
            Expr::Compare { op, left, right } => format!(
                "{} {} {}",
                self.expr_to_str(*left),
                op.symbol(),
                self.expr_to_str(*right)
            ),
            Expr::Assign { left, right } => format!(
                "{} = {}",
                self.expr_to_str(*left),
                self.expr_to_str(*right)
            ),
            Expr::Unary { op, operand } => {
                format!("{}{}", op.symbol(), self.expr_to_str(*operand))
            }
            Expr::Binary { op, left, right } => format!(
                "{} {} {}",
                self.expr_to_str(*left),
                op.symbol(),
                self.expr_to_str(*right)
            ),
            Expr::Member { base, field, arrow } => format!(
                "{}{}{}",
                self.expr_to_str(*base),
                if *arrow { "->" } else { "." },
                field
            ),
            Expr::Index { base, offset } => format!(
                "{}[{}]",
                self.expr_to_str(*base),
                self.expr_to_str(*offset)
            ),
            Expr::Call { callee, args } => {
                let rendered: Vec<String> =
                    args.iter().map(|a| self.expr_to_str(*a)).collect();
                format!("{}({})", self.expr_to_str(*callee), rendered.join(", "))
            }
            Expr::Paren { inner } => format!("({})", self.expr_to_str(*inner)),
            Expr::Expanded { inner } => self.expr_to_str(*inner),
        }
    }
}

/// Computed parent relation over one unit's arenas.
///
/// Built once per unit before the checks run; `parent_expr` answers "what is
/// the smallest enclosing expression" and `parent_stmt` answers "which
/// statement contains the outermost enclosing expression". Absence of a
/// parent is a valid terminal result, never an error.
#[derive(Debug, Default)]
pub struct ParentIndex {
    expr_parent: HashMap<ExprId, ExprId>,
    root_stmt: HashMap<ExprId, StmtId>,
}

impl ParentIndex {
    pub fn build(unit: &Unit) -> Self {
        let mut index = ParentIndex::default();
        for i in 0..unit.stmt_count() {
            let sid = StmtId(i as u32);
            for root in unit.stmt(sid).root_exprs() {
                index.root_stmt.insert(root, sid);
                index.record_children(unit, root);
            }
        }
        index
    }

    fn record_children(&mut self, unit: &Unit, parent: ExprId) {
        for child in unit.expr(parent).children() {
            self.expr_parent.insert(child, parent);
            self.record_children(unit, child);
        }
    }

    /// Smallest enclosing expression, or none at an expression root.
    pub fn parent_expr(&self, expr: ExprId) -> Option<ExprId> {
        self.expr_parent.get(&expr).copied()
    }

    /// Outermost enclosing expression (the expression root itself when the
    /// expression has no parent).
    pub fn outermost(&self, mut expr: ExprId) -> ExprId {
        while let Some(parent) = self.parent_expr(expr) {
            expr = parent;
        }
        expr
    }

    /// Statement syntactically containing the outermost enclosing expression.
    pub fn parent_stmt(&self, expr: ExprId) -> Option<StmtId> {
        self.root_stmt.get(&self.outermost(expr)).copied()
    }
}
