//! spectre-lint: pattern diagnosis over parsed expression/statement trees.
//!
//! Two built-in checks inspect a front-end-supplied `ast::Unit`:
//! - `checks::loops::LoopDerefCheck` flags double-pointer dereferences and
//!   pointer-chasing reassignments inside loop bodies (plus two text
//!   heuristics);
//! - `checks::spectre::SpectreIndexCheck` flags array accesses whose index is
//!   not provably bounded, as potential speculative-execution gadgets.
//!
//! The caller registers checks on a `CheckEngine` and either drives its own
//! traversal through `condition_evaluated` / `operation_evaluated`, or lets
//! `CheckEngine::run` walk the unit depth-first. All per-unit mutable state
//! (suppression set, first-half markers, findings) lives in an
//! `AnalysisContext` created at unit start and discarded at unit end.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

pub mod ast;
pub mod checks;

use ast::{ExprId, ParentIndex, Stmt, StmtId, Unit};
pub use checks::loops::LoopDerefCheck;
pub use checks::spectre::SpectreIndexCheck;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Which detector pattern produced a finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Declaration initialized from a double unary-dereference.
    DoubleDeref,
    /// Assignment whose right side is a double unary-dereference.
    DerefAssign,
    /// Loop variable reassigned through its own dereferenced field.
    PointerChase,
    /// Rendered statement text contains the literal substring `**`.
    TextDoubleStar,
    /// Rendered statement text matches the `->…->` chain pattern.
    TextArrowChain,
    /// Array access with an index not provably in bounds.
    SpectreArray,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    pub fn letter(&self) -> &'static str {
        match self {
            AccessKind::Read => "r",
            AccessKind::Write => "w",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckMetadata {
    pub id: String,
    pub name: String,
    pub short_description: String,
    pub full_description: String,
    pub default_severity: Severity,
}

/// One reported diagnostic instance. `message` carries the final one-line
/// rendering; the remaining fields keep the structured pieces for consumers
/// that post-process findings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub check_id: String,
    pub check_name: String,
    pub severity: Severity,
    pub kind: FindingKind,
    pub message: String,
    /// Rendered offending expression (Family A) or base pointer name
    /// (Family B).
    pub expr: String,
    pub access: Option<AccessKind>,
    /// A branch condition was seen guarding the index (informational only).
    pub guarded: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub findings: Vec<Finding>,
    pub checks: Vec<CheckMetadata>,
    /// Accesses marked for the paired second-half correlation check.
    pub first_half: Vec<ExprId>,
}

/// Per-run toggles. Single-report suppression matches the historical default;
/// the text heuristics are deliberately weaker signal sources and can be
/// switched off without affecting the structural checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Report at most one Family B finding per base pointer per unit.
    pub suppress_multiple: bool,
    pub double_star_heuristic: bool,
    pub arrow_chain_heuristic: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            suppress_multiple: true,
            double_star_heuristic: true,
            arrow_chain_heuristic: true,
        }
    }
}

/// Mutable state scoped to one translation unit's analysis. Create it when
/// the unit's traversal starts, discard it when the traversal ends;
/// suppression keys are meaningless across units.
pub struct AnalysisContext {
    pub config: AnalysisConfig,
    findings: Vec<Finding>,
    reported_bases: HashSet<String>,
    first_half: HashSet<ExprId>,
}

impl AnalysisContext {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            config: *config,
            findings: Vec::new(),
            reported_bases: HashSet::new(),
            first_half: HashSet::new(),
        }
    }

    pub fn push_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn base_already_reported(&self, base: &str) -> bool {
        self.reported_bases.contains(base)
    }

    pub fn mark_base_reported(&mut self, base: String) {
        self.reported_bases.insert(base);
    }

    /// Record the first-half correlation marker for a flagged access.
    pub fn set_first_half(&mut self, expr: ExprId) {
        self.first_half.insert(expr);
    }

    pub fn has_first_half(&self, expr: ExprId) -> bool {
        self.first_half.contains(&expr)
    }

    fn finish(self) -> (Vec<Finding>, Vec<ExprId>) {
        let mut markers: Vec<ExprId> = self.first_half.into_iter().collect();
        markers.sort();
        (self.findings, markers)
    }
}

/// One listener per event kind. The default implementations are no-ops so a
/// check only overrides the event it cares about.
pub trait Check: Send + Sync {
    fn metadata(&self) -> &CheckMetadata;

    /// A conditional expression was evaluated (an `if` condition or a loop
    /// pre-/post-condition, or an operand of one).
    fn on_condition(
        &self,
        _unit: &Unit,
        _parents: &ParentIndex,
        _cx: &mut AnalysisContext,
        _expr: ExprId,
    ) {
    }

    /// An operation/access expression was evaluated.
    fn on_operation(
        &self,
        _unit: &Unit,
        _parents: &ParentIndex,
        _cx: &mut AnalysisContext,
        _expr: ExprId,
    ) {
    }
}

pub struct CheckEngine {
    checks: Vec<Box<dyn Check>>,
}

impl CheckEngine {
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    pub fn with_builtin_checks() -> Self {
        let mut engine = CheckEngine::new();
        register_builtin_checks(&mut engine);
        engine
    }

    pub fn register_check(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    pub fn check_metadata(&self) -> Vec<CheckMetadata> {
        self.checks
            .iter()
            .map(|check| check.metadata().clone())
            .collect()
    }

    /// Dispatch a "conditional expression evaluated" event to every check.
    pub fn condition_evaluated(
        &self,
        unit: &Unit,
        parents: &ParentIndex,
        cx: &mut AnalysisContext,
        expr: ExprId,
    ) {
        for check in &self.checks {
            check.on_condition(unit, parents, cx, expr);
        }
    }

    /// Dispatch an "operation evaluated" event to every check.
    pub fn operation_evaluated(
        &self,
        unit: &Unit,
        parents: &ParentIndex,
        cx: &mut AnalysisContext,
        expr: ExprId,
    ) {
        for check in &self.checks {
            check.on_operation(unit, parents, cx, expr);
        }
    }

    /// Analyze one translation unit: build the parent index, create the
    /// per-unit context, and fire events in depth-first source order so the
    /// findings come out in traversal order.
    pub fn run(&self, unit: &Unit, config: &AnalysisConfig) -> AnalysisResult {
        let parents = ParentIndex::build(unit);
        let mut cx = AnalysisContext::new(config);

        for &stmt in unit.top_level() {
            self.walk_stmt(unit, &parents, &mut cx, stmt);
        }

        let (findings, first_half) = cx.finish();
        AnalysisResult {
            findings,
            checks: self.check_metadata(),
            first_half,
        }
    }

    fn walk_stmt(
        &self,
        unit: &Unit,
        parents: &ParentIndex,
        cx: &mut AnalysisContext,
        stmt: StmtId,
    ) {
        match unit.stmt(stmt) {
            Stmt::Declaration { symbols } => {
                for sym in symbols {
                    if let Some(init) = sym.initializer {
                        self.walk_expr(unit, parents, cx, init);
                    }
                }
            }
            Stmt::Expression { expr } => self.walk_expr(unit, parents, cx, *expr),
            Stmt::Iterator {
                pre_condition,
                post_condition,
                body,
            } => {
                if let Some(cond) = *pre_condition {
                    self.condition_evaluated(unit, parents, cx, cond);
                    self.walk_expr(unit, parents, cx, cond);
                }
                for &inner in body {
                    self.walk_stmt(unit, parents, cx, inner);
                }
                if let Some(cond) = *post_condition {
                    self.condition_evaluated(unit, parents, cx, cond);
                    self.walk_expr(unit, parents, cx, cond);
                }
            }
            Stmt::If {
                condition,
                then_body,
                else_body,
            } => {
                self.condition_evaluated(unit, parents, cx, *condition);
                self.walk_expr(unit, parents, cx, *condition);
                for &inner in then_body {
                    self.walk_stmt(unit, parents, cx, inner);
                }
                for &inner in else_body {
                    self.walk_stmt(unit, parents, cx, inner);
                }
            }
            Stmt::Return { value } => {
                if let Some(expr) = *value {
                    self.walk_expr(unit, parents, cx, expr);
                }
            }
            Stmt::Block { body } => {
                for &inner in body {
                    self.walk_stmt(unit, parents, cx, inner);
                }
            }
        }
    }

    fn walk_expr(
        &self,
        unit: &Unit,
        parents: &ParentIndex,
        cx: &mut AnalysisContext,
        expr: ExprId,
    ) {
        self.operation_evaluated(unit, parents, cx, expr);
        for child in unit.expr(expr).children() {
            self.walk_expr(unit, parents, cx, child);
        }
    }
}

impl Default for CheckEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Register the two built-in detectors.
pub fn register_builtin_checks(engine: &mut CheckEngine) {
    engine.register_check(Box::new(LoopDerefCheck::new()));
    engine.register_check(Box::new(SpectreIndexCheck::new()));
}

/// Load a front-end-serialized unit from JSON.
pub fn load_unit_json<P: AsRef<Path>>(path: P) -> Result<Unit> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("read unit JSON {}", path.display()))?;
    let unit: Unit = serde_json::from_str(&contents)
        .with_context(|| format!("parse unit JSON {}", path.display()))?;
    unit.validate()
        .with_context(|| format!("invalid unit JSON {}", path.display()))?;
    Ok(unit)
}

/// Write an analysis result as pretty-printed JSON.
pub fn write_findings_json<P: AsRef<Path>>(path: P, result: &AnalysisResult) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }
    }
    let rendered = serde_json::to_string_pretty(result).context("serialize findings")?;
    fs::write(path, rendered)
        .with_context(|| format!("write findings JSON {}", path.display()))?;
    Ok(())
}
