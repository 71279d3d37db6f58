//! Include resolution and composition tests
//!
//! End-to-end loads through the public API: includes by path, by registered
//! name, and by namespace reference, composed in declared order.

mod common;

use common::TestWorkspace;
use mountplan::{MountPlan, MountplanError, validate_completeness};

#[tokio::test]
async fn test_include_merges_module_lists() {
    let ws = TestWorkspace::new();
    ws.write_bundle(
        "base",
        "providers:\n  - module: provider-anthropic\n    config:\n      model: opus\ntools:\n  - module: tool-fs\n",
        "",
    );
    ws.write_bundle(
        "app",
        &format!(
            "includes:\n  - {}\nproviders:\n  - module: provider-anthropic\n    config:\n      max_tokens: 4096\ntools:\n  - module: tool-bash\n",
            ws.bundle_ref("base")
        ),
        "App instruction.",
    );

    let bundle = ws.loader().load(&ws.bundle_ref("app")).await.unwrap();

    // Shared provider id: configs merge, overlay wins on conflicts
    assert_eq!(bundle.providers.len(), 1);
    let provider = bundle.providers[0].as_mapping().unwrap();
    let config = provider.get("config").unwrap().as_mapping().unwrap();
    assert_eq!(config.get("model").unwrap().as_str(), Some("opus"));
    assert_eq!(config.get("max_tokens").unwrap().as_u64(), Some(4096));

    // Disjoint tool ids: appended in order, not replaced
    let tools: Vec<_> = bundle
        .tools
        .iter()
        .filter_map(|t| t.as_mapping()?.get("module")?.as_str())
        .collect();
    assert_eq!(tools, vec!["tool-fs", "tool-bash"]);

    assert_eq!(bundle.instruction.as_deref(), Some("App instruction."));
    assert_eq!(bundle.name, "app");
}

#[tokio::test]
async fn test_includes_compose_in_declared_order() {
    let ws = TestWorkspace::new();
    ws.write_bundle("first", "session:\n  orchestrator: loop\n  depth: 1\n", "From first.");
    ws.write_bundle("second", "session:\n  depth: 2\n", "From second.");
    ws.write_bundle(
        "top",
        &format!(
            "includes:\n  - {}\n  - {}\n",
            ws.bundle_ref("first"),
            ws.bundle_ref("second")
        ),
        "",
    );

    let bundle = ws.loader().load(&ws.bundle_ref("top")).await.unwrap();

    // second overlays first; top has no instruction so second's survives
    assert_eq!(bundle.instruction.as_deref(), Some("From second."));
    let session = bundle.session.as_mapping().unwrap();
    assert_eq!(session.get("orchestrator").unwrap().as_str(), Some("loop"));
    assert_eq!(session.get("depth").unwrap().as_u64(), Some(2));
    assert_eq!(bundle.name, "top");
}

#[tokio::test]
async fn test_include_by_registered_name() {
    let ws = TestWorkspace::new();
    ws.write_bundle("library", "hooks:\n  - module: hook-logger\n", "");
    ws.discovery.register("library", ws.bundle_ref("library"));
    ws.write_bundle("app", "includes:\n  - library\n", "");

    let bundle = ws.loader().load(&ws.bundle_ref("app")).await.unwrap();
    assert_eq!(bundle.hooks.len(), 1);
    assert!(bundle.source_base_paths.contains_key("library"));
}

#[tokio::test]
async fn test_include_by_namespace_subpath() {
    let ws = TestWorkspace::new();
    let lib_dir = ws.write_bundle("library", "", "");
    std::fs::create_dir_all(lib_dir.join("behaviors")).unwrap();
    std::fs::write(
        lib_dir.join("behaviors/streaming.md"),
        "---\nbundle:\n  name: streaming\ntools:\n  - module: tool-stream\n---\n",
    )
    .unwrap();
    ws.discovery.register("library", ws.bundle_ref("library"));
    ws.write_bundle("app", "includes:\n  - library:behaviors/streaming\n", "");

    let bundle = ws.loader().load(&ws.bundle_ref("app")).await.unwrap();
    let tools: Vec<_> = bundle
        .tools
        .iter()
        .filter_map(|t| t.as_mapping()?.get("module")?.as_str())
        .collect();
    assert_eq!(tools, vec!["tool-stream"]);
}

#[tokio::test]
async fn test_unregistered_include_name_fails() {
    let ws = TestWorkspace::new();
    ws.write_bundle("app", "includes:\n  - never-registered\n", "");
    let err = ws
        .loader()
        .load(&ws.bundle_ref("app"))
        .await
        .unwrap_err();
    assert!(matches!(err, MountplanError::BundleNotFound { .. }));
}

#[tokio::test]
async fn test_nested_includes_compose_transitively() {
    let ws = TestWorkspace::new();
    ws.write_bundle("leaf", "tools:\n  - module: tool-leaf\n", "");
    ws.write_bundle(
        "middle",
        &format!(
            "includes:\n  - {}\ntools:\n  - module: tool-middle\n",
            ws.bundle_ref("leaf")
        ),
        "",
    );
    ws.write_bundle(
        "root",
        &format!(
            "includes:\n  - {}\ntools:\n  - module: tool-root\n",
            ws.bundle_ref("middle")
        ),
        "",
    );

    let bundle = ws.loader().load(&ws.bundle_ref("root")).await.unwrap();
    let tools: Vec<_> = bundle
        .tools
        .iter()
        .filter_map(|t| t.as_mapping()?.get("module")?.as_str())
        .collect();
    assert_eq!(tools, vec!["tool-leaf", "tool-middle", "tool-root"]);

    // All three namespaces recorded for mention resolution
    for ns in ["leaf", "middle", "root"] {
        assert!(bundle.source_base_paths.contains_key(ns), "missing {ns}");
    }
}

#[tokio::test]
async fn test_mount_plan_projection_of_loaded_bundle() {
    let ws = TestWorkspace::new();
    ws.write_bundle(
        "exec",
        "session:\n  orchestrator: loop\n  context: sliding\nproviders:\n  - module: provider-anthropic\nagents:\n  include: [scout]\ncontext:\n  include: [notes]\n",
        "Run well.",
    );
    let dir = ws.path.join("bundles/exec");
    std::fs::create_dir_all(dir.join("context")).unwrap();
    std::fs::write(dir.join("context/notes.md"), "note body").unwrap();

    let bundle = ws.loader().load(&ws.bundle_ref("exec")).await.unwrap();
    assert!(validate_completeness(&bundle).valid);

    let plan = MountPlan::from_bundle(&bundle);
    let json = plan.to_json_value().unwrap();
    let object = json.as_object().unwrap();
    assert_eq!(
        object.keys().collect::<Vec<_>>(),
        vec!["agents", "providers", "session"]
    );

    let rendered = mountplan::render_instruction(&bundle).await.unwrap().unwrap();
    assert!(rendered.contains("Run well."));
    assert!(rendered.contains("note body"));
}
