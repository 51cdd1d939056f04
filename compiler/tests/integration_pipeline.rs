// Integration tests for the editing surface driving the compiler.
//
// These tests build snapshots through `GraphSnapshot` edit operations, the
// way the editor does, and check what the compiler sees afterwards:
// - cached argument types follow upstream edits
// - validation reports references broken by deletions
// - generated code tracks renames and ordering edges

use pbc::codegen::{compile, CodegenOptions};
use pbc::graph::{ArgMode, NodeId, PipelineParam, TypeTag};
use pbc::normalize::{ArgumentPatch, OutputPatch};
use pbc::snapshot::{GraphSnapshot, RawNode};
use pbc::validate::validate;

fn no_fp() -> CodegenOptions {
    CodegenOptions { fingerprint: false }
}

fn node(label: &str) -> RawNode {
    RawNode {
        label: Some(label.to_string()),
        component_type: Some("python".to_string()),
        ..Default::default()
    }
}

fn generate(snap: &GraphSnapshot) -> String {
    let result = compile(
        &snap.nodes,
        &snap.edges,
        &snap.pipeline_params,
        &snap.pipeline_name,
        &no_fp(),
    );
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    result.generated.source
}

/// Two nodes wired data-first: `Load` produces `data`, `Train` consumes it.
fn load_then_train() -> (GraphSnapshot, NodeId, NodeId) {
    let mut snap = GraphSnapshot::new("train flow");
    let load = snap.add_node(&node("Load"));
    let train = snap.add_node(&node("Train"));

    snap.add_output(&load).unwrap();
    snap.patch_output(
        &load,
        0,
        &OutputPatch {
            name: Some("data".into()),
            ..Default::default()
        },
    )
    .unwrap();

    snap.add_argument(&train).unwrap();
    snap.patch_argument(
        &train,
        0,
        &ArgumentPatch {
            name: Some("data".into()),
            mode: Some(ArgMode::Node),
            node_id: Some(load.clone()),
            output_name: Some("data".into()),
            ..Default::default()
        },
    )
    .unwrap();
    snap.connect(&load, &train).unwrap();
    (snap, load, train)
}

#[test]
fn edits_keep_argument_types_in_sync() {
    let (mut snap, load, train) = load_then_train();
    assert_eq!(
        snap.node(&train).unwrap().args[0].ty,
        TypeTag::parse("Input[Dataset]")
    );

    snap.patch_output(
        &load,
        0,
        &OutputPatch {
            kind: Some(TypeTag::parse("Output[Model]")),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(
        snap.node(&train).unwrap().args[0].ty,
        TypeTag::parse("Input[Model]")
    );

    let code = generate(&snap);
    assert!(code.contains("def Load(data: Output[Model]) -> None:"));
    assert!(code.contains("def Train(data: Input[Model]) -> str:"));
    assert!(code.contains("step1 = Train(data=step0.outputs['data'])"));
    assert!(code.contains("    step1.after(step0)\n"));
}

#[test]
fn pipeline_parameter_retype_reaches_arguments() {
    let (mut snap, _, train) = load_then_train();
    snap.set_pipeline_params(vec![PipelineParam::new("lr", TypeTag::parse("str"), Some("0.1"))]);
    let idx = snap.node(&train).unwrap().args.len();
    snap.add_argument(&train).unwrap();
    snap.patch_argument(
        &train,
        idx,
        &ArgumentPatch {
            name: Some("lr".into()),
            mode: Some(ArgMode::Pipeline),
            key: Some("lr".into()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(snap.node(&train).unwrap().args[1].ty, TypeTag::parse("str"));

    snap.set_pipeline_params(vec![PipelineParam::new("lr", TypeTag::parse("float"), Some("0.1"))]);
    assert_eq!(snap.node(&train).unwrap().args[1].ty, TypeTag::parse("float"));

    let code = generate(&snap);
    assert!(code.contains("def train_flow(lr: float = 0.1):"));
    assert!(code.contains("lr=lr"));
}

#[test]
fn deleting_upstream_breaks_validation_not_codegen() {
    let (mut snap, load, train) = load_then_train();
    assert!(validate(&snap.nodes, &snap.edges, &snap.pipeline_params).valid);

    snap.remove_node(&load).unwrap();
    assert!(snap.edges.is_empty());

    let report = validate(&snap.nodes, &snap.edges, &snap.pipeline_params);
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert!(report.messages()[0].contains("Node \"Train\", Arg 0"));

    // codegen still renders, with the dangling reference as None
    let code = generate(&snap);
    assert!(code.contains("step0 = Train(data=None)"));
    assert!(snap.node(&train).is_some());
}

#[test]
fn duplicate_labels_get_distinct_functions() {
    let mut snap = GraphSnapshot::new("");
    let a = snap.add_node(&node("Load"));
    let b = snap.add_node(&node("Load"));
    let c = snap.add_node(&node("Load"));
    snap.connect(&c, &a).unwrap();
    snap.connect(&c, &b).unwrap();

    let code = generate(&snap);
    assert!(code.contains("def Load() -> str:"));
    assert!(code.contains("def Load_1() -> str:"));
    assert!(code.contains("def Load_2() -> str:"));
    // c is emitted first, so it takes the unsuffixed name
    assert!(code.contains("    step0 = Load()\n    step1 = Load_1()\n    step2 = Load_2()\n"));
    assert!(code.contains("    step1.after(step0)\n    step2.after(step0)\n"));
    assert!(code.contains("@pipeline(name='ml_pipeline')"));
}

#[test]
fn new_nodes_use_editor_defaults() {
    let mut snap = GraphSnapshot::new("p");
    let id = snap.add_node(&RawNode::default());
    let n = snap.node(&id).unwrap();
    assert_eq!(n.label, "New Component");
    assert_eq!(n.component_type, "blank");

    snap.rename_node(&id, "Fetch CSV").unwrap();
    snap.set_base_image(&id, "python:3.12-slim").unwrap();
    snap.set_code(&id, "def whatever():\n    return 'ok'").unwrap();

    let code = generate(&snap);
    assert!(code.contains(
        "@component(base_image='python:3.12-slim')\ndef Fetch_CSV() -> str:\n    return 'ok'\n"
    ));
}
