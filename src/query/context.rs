// Context assembly: orchestrates definition lookup, call extraction, and the
// caller scan into one FunctionContext.

use std::collections::HashSet;

use crate::query::engine::QueryEngine;
use crate::query::{CallerBlock, FunctionContext, TargetContext};

impl QueryEngine {
    /// Build the full context graph for one function name.
    ///
    /// Every sub-step degrades to empty/skip on failure rather than aborting:
    /// a partial, explainable context beats a failed query. A name with no
    /// definition anywhere yields `target: None` with empty collections.
    pub fn build_context(&self, function_name: &str) -> FunctionContext {
        // Resolve the target. With duplicate definitions the first extracted
        // block wins; extraction order is deterministic by sorted artifact key.
        let mut target_defs = self.extract_code(function_name);
        if target_defs.is_empty() {
            return FunctionContext::not_found();
        }
        let target_def = target_defs.remove(0);

        // Resolve internal callees in first-seen order. Names that resolve to
        // no definition are built-ins, library calls, or unresolved attribute
        // calls; they are dropped silently.
        let mut seen_internal: HashSet<String> = HashSet::new();
        let mut internal = Vec::new();
        for name in self.called_names_in_order(&target_def.code) {
            if name == function_name || seen_internal.contains(&name) {
                continue;
            }
            let sub_defs = self.extract_code(&name);
            if !sub_defs.is_empty() {
                internal.extend(sub_defs);
                seen_internal.insert(name);
            }
        }
        let called_count = seen_internal.len();

        // Callers are counted before slicing, so the count still reflects
        // locations whose file can no longer be resolved.
        let caller_locs = self.find_callers(function_name);
        let called_by_count = caller_locs.len();

        let mut caller = Vec::new();
        for loc in caller_locs {
            if let Some(code) = self.slice_span(&loc) {
                caller.push(CallerBlock {
                    label: format!("(caller of {})", function_name),
                    file: loc.file,
                    code,
                });
            }
        }

        FunctionContext {
            target: Some(TargetContext {
                function: target_def.function,
                file: target_def.file,
                code: target_def.code,
                called_count,
                called_by_count,
            }),
            internal,
            caller,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexingConfig;
    use crate::index::store::TreeStore;
    use crate::indexer::Indexer;
    use std::fs;
    use std::path::Path;

    const PAD: &str = "# ------------------------------\n";

    fn write_file(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn indexed_engine(repo: &Path, store_dir: &Path) -> QueryEngine {
        let store = TreeStore::open(store_dir).unwrap();
        let indexer = Indexer::new(store.clone(), IndexingConfig::default());
        indexer.index_repository(repo).unwrap();
        QueryEngine::new(store, repo)
    }

    #[test]
    fn test_missing_function_yields_empty_context() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(repo.path(), "a.py", &format!("{PAD}def f():\n    pass\n"));

        let engine = indexed_engine(repo.path(), store_dir.path());
        let context = engine.build_context("missing_fn");

        assert!(context.target.is_none());
        assert!(context.internal.is_empty());
        assert!(context.caller.is_empty());
    }

    #[test]
    fn test_unresolved_callee_dropped_silently() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        // g has no definition anywhere: a built-in or library call.
        write_file(repo.path(), "a.py", &format!("{PAD}def f():\n    g()\n"));

        let engine = indexed_engine(repo.path(), store_dir.path());
        let context = engine.build_context("f");

        let target = context.target.unwrap();
        assert_eq!(target.called_count, 0);
        assert!(context.internal.is_empty());
    }

    #[test]
    fn test_self_reference_skipped() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "a.py",
            &format!("{PAD}def fact(n):\n    return n * fact(n - 1)\n"),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        let context = engine.build_context("fact");

        let target = context.target.unwrap();
        assert_eq!(target.called_count, 0);
        assert!(context.internal.is_empty());
        // The recursive definition is its own caller.
        assert_eq!(target.called_by_count, 1);
    }

    #[test]
    fn test_duplicate_call_sites_counted_once_per_caller() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(repo.path(), "f.py", &format!("{PAD}def f():\n    pass\n"));
        write_file(
            repo.path(),
            "h.py",
            &format!("{PAD}def h1():\n    f()\n    f()\n\n\ndef h2():\n    f()\n"),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        let context = engine.build_context("f");

        let target = context.target.unwrap();
        assert_eq!(target.called_by_count, 2);
        assert_eq!(context.caller.len(), 2);
        assert!(context.caller.iter().all(|c| c.label == "(caller of f)"));
    }

    #[test]
    fn test_called_by_count_survives_unresolvable_file() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(repo.path(), "f.py", &format!("{PAD}def f():\n    pass\n"));
        write_file(
            repo.path(),
            "gone.py",
            &format!("{PAD}def h():\n    f()\n"),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        fs::remove_file(repo.path().join("gone.py")).unwrap();

        let context = engine.build_context("f");
        let target = context.target.unwrap();

        // Counted before slicing; the slice itself is skipped.
        assert_eq!(target.called_by_count, 1);
        assert!(context.caller.is_empty());
    }

    #[test]
    fn test_full_scenario() {
        let repo = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        write_file(
            repo.path(),
            "pkg/a.py",
            &format!("{PAD}def foo():\n    bar()\n"),
        );
        write_file(
            repo.path(),
            "pkg/b.py",
            &format!("{PAD}def bar():\n    pass\n\n\ndef caller():\n    foo()\n"),
        );

        let engine = indexed_engine(repo.path(), store_dir.path());
        let context = engine.build_context("foo");

        let target = context.target.unwrap();
        assert_eq!(target.function, "foo");
        assert_eq!(target.file, "pkg/a.py");
        assert_eq!(target.called_count, 1);
        assert_eq!(target.called_by_count, 1);

        assert_eq!(context.internal.len(), 1);
        assert_eq!(context.internal[0].function, "bar");
        assert_eq!(context.internal[0].file, "pkg/b.py");
        assert_eq!(context.internal[0].code, "def bar():\n    pass");

        assert_eq!(context.caller.len(), 1);
        assert_eq!(context.caller[0].label, "(caller of foo)");
        assert_eq!(context.caller[0].file, "pkg/b.py");
        assert_eq!(context.caller[0].code, "def caller():\n    foo()");
    }
}
