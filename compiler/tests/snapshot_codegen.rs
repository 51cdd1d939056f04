// Snapshot tests: lock generated Python output to detect unintended behavior changes.
//
// Uses the library API (normalize → sync → validate → sequence → codegen)
// through `run_pipeline`. Snapshots are inline `insta` snapshots; the
// fingerprint line is disabled so they do not churn with serialization details.
//
// Run `cargo insta review` after intentional output changes to update baselines.

use std::path::{Path, PathBuf};

use pbc::codegen::CodegenOptions;
use pbc::pass::PassId;
use pbc::pipeline::{run_pipeline, CompilationState};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Run the full compiler pipeline on snapshot JSON and return generated Python.
fn compile_json(json: &str) -> String {
    let raw = pbc::snapshot::parse_raw(json).expect("fixture should parse");
    let mut state = CompilationState::new(raw);
    let options = CodegenOptions { fingerprint: false };
    run_pipeline(&mut state, PassId::Codegen, &options, |_, _| {}).unwrap_or_else(|e| {
        panic!("{}: {:?}", e, state_messages(&state));
    });
    state.generated.expect("codegen should produce output").source
}

fn state_messages(state: &CompilationState) -> Vec<String> {
    state.diagnostics.iter().map(|d| d.to_string()).collect()
}

#[test]
fn training_pipeline() {
    let json = std::fs::read_to_string(fixture("training.json")).unwrap();
    insta::assert_snapshot!(compile_json(&json), @r##"
    # Pipeline: Training Pipeline
    # Generated by Pipeline Builder
    # Params: [{"key":"learning rate","type":"float","value":"0.01"},{"key":"dataset_url","type":"str"}]

    from kfp.dsl import pipeline, component, Input, Output, Dataset, Model


    @component()
    def Load_Data(url: str, dataset: Output[Dataset]) -> None:
        import urllib.request
        urllib.request.urlretrieve(url, dataset.path)


    @component(base_image='python:3.11')
    def Train_Model(data: Input[Dataset], lr: float, epochs: int, model: Output[Model]) -> None:
        model.metadata['lr'] = lr


    @pipeline(name='Training Pipeline')
    def Training_Pipeline(dataset_url: str, learning_rate: float = 0.01):
        step0 = Load_Data(url=dataset_url)
        step1 = Train_Model(data=step0.outputs['dataset'], lr=learning_rate, epochs=10)

        step1.after(step0)


    if __name__ == "__main__":
        from kfp.compiler import Compiler

        Compiler().compile(
            pipeline_func=Training_Pipeline,
            package_path="Training_Pipeline.yaml"
        )
    "##);
}

#[test]
fn single_blank_component() {
    let json = r#"{"nodes": [{"id": "n", "label": "say hello", "componentType": "python"}]}"#;
    insta::assert_snapshot!(compile_json(json), @r##"
    # Pipeline: ml_pipeline
    # Generated by Pipeline Builder
    # Params: []

    from kfp.dsl import pipeline, component


    @component()
    def say_hello() -> str:
        pass


    @pipeline(name='ml_pipeline')
    def ml_pipeline():
        step0 = say_hello()


    if __name__ == "__main__":
        from kfp.compiler import Compiler

        Compiler().compile(
            pipeline_func=ml_pipeline,
            package_path="ml_pipeline.yaml"
        )
    "##);
}

#[test]
fn colliding_labels_and_anonymous_return() {
    let json = r#"{
        "pipelineName": "etl",
        "nodes": [
            {"id": "a", "label": "Load", "componentType": "python", "returnType": "int",
             "code": "return 1"},
            {"id": "b", "label": "load", "componentType": "python"},
            {"id": "c", "label": "Load", "componentType": "python",
             "args": [{"id": "x", "name": "count", "mode": "node", "nodeId": "a"},
                      {"id": "y", "name": "class", "value": "true", "type": "bool"}]}
        ],
        "edges": [{"source": "a", "target": "c"}]
    }"#;
    insta::assert_snapshot!(compile_json(json), @r##"
    # Pipeline: etl
    # Generated by Pipeline Builder
    # Params: []

    from kfp.dsl import pipeline, component


    @component()
    def Load() -> int:
        return 1


    @component()
    def load() -> str:
        pass


    @component()
    def Load_1(count: int, class_: bool) -> str:
        pass


    @pipeline(name='etl')
    def etl():
        step0 = Load()
        step1 = load()
        step2 = Load_1(count=step0.output, class_=True)

        step2.after(step0)


    if __name__ == "__main__":
        from kfp.compiler import Compiler

        Compiler().compile(
            pipeline_func=etl,
            package_path="etl.yaml"
        )
    "##);
}
