// Function-context resolution: definition lookup, call extraction, caller
// scan, and context assembly over the tree store.

pub mod context;
pub mod engine;

use serde::Serialize;

/// Where a function definition lives. Many definitions may share one name
/// across files; lookups return all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefinitionLocation {
    /// Repository-relative path, `/`-separated.
    pub file: String,
    /// 1-based line of the definition.
    pub start_line: u32,
    /// 1-based inclusive last line, when the parser recorded one.
    pub end_line: Option<u32>,
}

/// A definition's extracted source.
#[derive(Debug, Clone, Serialize)]
pub struct CodeBlock {
    pub function: String,
    pub file: String,
    pub code: String,
}

/// One enclosing definition that calls the target.
#[derive(Debug, Clone, Serialize)]
pub struct CallerBlock {
    /// `(caller of <name>)`, serialized under the `function` key alongside
    /// the other block kinds.
    #[serde(rename = "function")]
    pub label: String,
    pub file: String,
    pub code: String,
}

/// The resolved target of a context query.
#[derive(Debug, Clone, Serialize)]
pub struct TargetContext {
    pub function: String,
    pub file: String,
    pub code: String,
    /// Distinct callee names that resolved to a definition.
    pub called_count: usize,
    /// Caller locations found, counted before source slicing; may exceed the
    /// number of caller blocks when some files cannot be resolved.
    pub called_by_count: usize,
}

/// Assembled context graph for one function name. `target` is None iff the
/// name has no definition anywhere in the index; that absence is a valid
/// result, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionContext {
    pub target: Option<TargetContext>,
    pub internal: Vec<CodeBlock>,
    pub caller: Vec<CallerBlock>,
}

impl FunctionContext {
    pub fn not_found() -> Self {
        Self {
            target: None,
            internal: Vec::new(),
            caller: Vec::new(),
        }
    }
}

/// How the caller scan reports a definition that calls the target more than
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerScanPolicy {
    /// One location per enclosing definition, however many call sites it
    /// contains. Keeps output stable for downstream prompting.
    FirstMatchPerDefinition,
    /// One location per recorded call site.
    EveryCallSite,
}

/// Policy applied by [`engine::QueryEngine::find_callers`].
pub const CALLER_SCAN: CallerScanPolicy = CallerScanPolicy::FirstMatchPerDefinition;
