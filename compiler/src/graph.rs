// graph.rs — Graph snapshot data model
//
// Nodes, arguments, output parameters, pipeline parameters and ordering
// edges, as supplied by the editing surface. An argument's mode-dependent
// payload is a tagged variant, so "exactly one payload populated" holds by
// construction. A node's outputs are either one anonymous typed return value
// or a list of named output parameters.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none. Unknown type strings are carried verbatim.
// Side effects: none.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Unique identifier of a node within a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

// ── Types ───────────────────────────────────────────────────────────────────

/// Scalar parameter types understood by the literal formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Bool,
}

/// Structured-artifact families of the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Dataset,
    Model,
    Artifact,
    Metrics,
    ClassificationMetrics,
    SlicedClassificationMetrics,
    Html,
    Markdown,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 8] = [
        ArtifactKind::Dataset,
        ArtifactKind::Model,
        ArtifactKind::Artifact,
        ArtifactKind::Metrics,
        ArtifactKind::ClassificationMetrics,
        ArtifactKind::SlicedClassificationMetrics,
        ArtifactKind::Html,
        ArtifactKind::Markdown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ArtifactKind::Dataset => "Dataset",
            ArtifactKind::Model => "Model",
            ArtifactKind::Artifact => "Artifact",
            ArtifactKind::Metrics => "Metrics",
            ArtifactKind::ClassificationMetrics => "ClassificationMetrics",
            ArtifactKind::SlicedClassificationMetrics => "SlicedClassificationMetrics",
            ArtifactKind::Html => "HTML",
            ArtifactKind::Markdown => "Markdown",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == s)
    }
}

/// A declared or cached type, as written in the target language.
///
/// Serialized as its annotation string (`"int"`, `"Output[Dataset]"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TypeTag {
    Any,
    Scalar(ScalarType),
    /// Bare artifact family, e.g. `Dataset`.
    Artifact(ArtifactKind),
    /// Consumer variant, e.g. `Input[Dataset]`.
    Input(ArtifactKind),
    /// Producer variant, e.g. `Output[Dataset]`.
    Output(ArtifactKind),
    /// Anything else, carried verbatim.
    Other(String),
}

impl Default for TypeTag {
    fn default() -> Self {
        TypeTag::Scalar(ScalarType::String)
    }
}

impl TypeTag {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s {
            "" | "Any" => return TypeTag::Any,
            "str" | "string" => return TypeTag::Scalar(ScalarType::String),
            "int" => return TypeTag::Scalar(ScalarType::Int),
            "float" => return TypeTag::Scalar(ScalarType::Float),
            "bool" => return TypeTag::Scalar(ScalarType::Bool),
            _ => {}
        }
        if let Some(kind) = ArtifactKind::from_name(s) {
            return TypeTag::Artifact(kind);
        }
        let wrapped = |prefix: &str| {
            s.strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix(']'))
                .and_then(|inner| ArtifactKind::from_name(inner.trim()))
        };
        if let Some(kind) = wrapped("Input[") {
            return TypeTag::Input(kind);
        }
        if let Some(kind) = wrapped("Output[") {
            return TypeTag::Output(kind);
        }
        TypeTag::Other(s.to_string())
    }

    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            TypeTag::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    /// The type a downstream consumer declares for a value of this type:
    /// producer artifacts become the consumer variant of the same family,
    /// everything else is passed through.
    pub fn as_consumed(&self) -> TypeTag {
        match self {
            TypeTag::Output(kind) => TypeTag::Input(*kind),
            other => other.clone(),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Any => f.write_str("Any"),
            TypeTag::Scalar(ScalarType::String) => f.write_str("str"),
            TypeTag::Scalar(ScalarType::Int) => f.write_str("int"),
            TypeTag::Scalar(ScalarType::Float) => f.write_str("float"),
            TypeTag::Scalar(ScalarType::Bool) => f.write_str("bool"),
            TypeTag::Artifact(kind) => f.write_str(kind.name()),
            TypeTag::Input(kind) => write!(f, "Input[{}]", kind.name()),
            TypeTag::Output(kind) => write!(f, "Output[{}]", kind.name()),
            TypeTag::Other(s) => f.write_str(s),
        }
    }
}

impl From<String> for TypeTag {
    fn from(s: String) -> Self {
        TypeTag::parse(&s)
    }
}

impl From<&str> for TypeTag {
    fn from(s: &str) -> Self {
        TypeTag::parse(s)
    }
}

impl From<TypeTag> for String {
    fn from(t: TypeTag) -> Self {
        t.to_string()
    }
}

// ── Arguments ───────────────────────────────────────────────────────────────

/// Where an argument's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgMode {
    Literal,
    Pipeline,
    Node,
}

impl ArgMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "literal" => Some(ArgMode::Literal),
            "pipeline" => Some(ArgMode::Pipeline),
            "node" => Some(ArgMode::Node),
            _ => None,
        }
    }
}

/// Mode-specific payload of an argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ArgSource {
    Literal {
        value: String,
    },
    Pipeline {
        key: String,
    },
    Node {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        #[serde(rename = "outputName", skip_serializing_if = "Option::is_none")]
        output_name: Option<String>,
    },
}

impl ArgSource {
    pub fn mode(&self) -> ArgMode {
        match self {
            ArgSource::Literal { .. } => ArgMode::Literal,
            ArgSource::Pipeline { .. } => ArgMode::Pipeline,
            ArgSource::Node { .. } => ArgMode::Node,
        }
    }

    /// Typed-empty payload for a mode.
    pub fn empty(mode: ArgMode) -> Self {
        match mode {
            ArgMode::Literal => ArgSource::Literal {
                value: String::new(),
            },
            ArgMode::Pipeline => ArgSource::Pipeline { key: String::new() },
            ArgMode::Node => ArgSource::Node {
                node_id: NodeId::default(),
                output_name: None,
            },
        }
    }
}

/// A typed node input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub source: ArgSource,
    /// Cached resolved type. Authoritative types live on the referenced
    /// parameter or upstream output; see `type_sync`.
    #[serde(rename = "type")]
    pub ty: TypeTag,
}

impl Argument {
    pub fn literal(id: &str, name: &str, value: &str, ty: TypeTag) -> Self {
        Argument {
            id: id.to_string(),
            name: name.to_string(),
            source: ArgSource::Literal {
                value: value.to_string(),
            },
            ty,
        }
    }

    pub fn pipeline(id: &str, name: &str, key: &str, ty: TypeTag) -> Self {
        Argument {
            id: id.to_string(),
            name: name.to_string(),
            source: ArgSource::Pipeline {
                key: key.to_string(),
            },
            ty,
        }
    }

    pub fn node_output(
        id: &str,
        name: &str,
        node: &str,
        output: Option<&str>,
        ty: TypeTag,
    ) -> Self {
        Argument {
            id: id.to_string(),
            name: name.to_string(),
            source: ArgSource::Node {
                node_id: NodeId::from(node),
                output_name: output.map(str::to_string),
            },
            ty,
        }
    }

    pub fn mode(&self) -> ArgMode {
        self.source.mode()
    }
}

// ── Outputs ─────────────────────────────────────────────────────────────────

/// A named, typed output a node produces for downstream consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputParam {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TypeTag,
}

impl OutputParam {
    pub fn new(id: &str, name: &str, kind: TypeTag) -> Self {
        OutputParam {
            id: id.to_string(),
            name: name.to_string(),
            kind,
        }
    }
}

/// What a node produces: one anonymous return value, or named outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returns {
    Single(TypeTag),
    Named(Vec<OutputParam>),
}

impl Default for Returns {
    fn default() -> Self {
        Returns::Single(TypeTag::default())
    }
}

impl Returns {
    /// Build from an output list, falling back to an anonymous return of
    /// `single` when the list is empty.
    pub fn from_outputs(outputs: Vec<OutputParam>, single: TypeTag) -> Self {
        if outputs.is_empty() {
            Returns::Single(single)
        } else {
            Returns::Named(outputs)
        }
    }

    pub fn outputs(&self) -> &[OutputParam] {
        match self {
            Returns::Single(_) => &[],
            Returns::Named(outputs) => outputs,
        }
    }

    pub fn find(&self, name: &str) -> Option<&OutputParam> {
        self.outputs().iter().find(|o| o.name == name)
    }

    /// The type a reference without an output name resolves to: the
    /// anonymous return, or the sole named output.
    pub fn sole_type(&self) -> Option<&TypeTag> {
        match self {
            Returns::Single(t) => Some(t),
            Returns::Named(outputs) if outputs.len() == 1 => Some(&outputs[0].kind),
            Returns::Named(_) => None,
        }
    }
}

// ── Nodes, parameters, edges ────────────────────────────────────────────────

/// A graph unit compiled to one component function.
///
/// Serialized in the wire shape: named outputs as `outputs`, the anonymous
/// return as `returnType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    pub component_type: String,
    /// Execution environment (container image); empty means platform default.
    pub base_image: String,
    pub args: Vec<Argument>,
    pub returns: Returns,
    /// Free-form component body.
    pub code: String,
}

impl Node {
    pub fn new(id: &str, label: &str) -> Self {
        Node {
            id: NodeId::from(id),
            label: label.to_string(),
            component_type: "python".to_string(),
            base_image: String::new(),
            args: Vec::new(),
            returns: Returns::default(),
            code: String::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Argument>) -> Self {
        self.args = args;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<OutputParam>) -> Self {
        self.returns = Returns::from_outputs(outputs, TypeTag::default());
        self
    }

    pub fn with_return_type(mut self, ty: TypeTag) -> Self {
        self.returns = Returns::Single(ty);
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.code = code.to_string();
        self
    }

    /// Label to show in messages, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            self.id.as_str()
        } else {
            &self.label
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("Node", 8)?;
        st.serialize_field("id", &self.id)?;
        st.serialize_field("label", &self.label)?;
        st.serialize_field("componentType", &self.component_type)?;
        st.serialize_field("baseImage", &self.base_image)?;
        st.serialize_field("args", &self.args)?;
        st.serialize_field("outputs", self.returns.outputs())?;
        match &self.returns {
            Returns::Single(ty) => st.serialize_field("returnType", ty)?,
            Returns::Named(_) => st.skip_field("returnType")?,
        }
        st.serialize_field("code", &self.code)?;
        st.end()
    }
}

/// A pipeline-level parameter exposed on the generated entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineParam {
    pub key: String,
    #[serde(rename = "type")]
    pub ty: TypeTag,
    /// Default literal, unformatted.
    #[serde(rename = "value", skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl PipelineParam {
    pub fn new(key: &str, ty: TypeTag, default: Option<&str>) -> Self {
        PipelineParam {
            key: key.to_string(),
            ty,
            default: default.map(str::to_string),
        }
    }
}

/// An explicit ordering dependency: `target` runs after `source`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
}

impl Edge {
    pub fn new(source: &str, target: &str) -> Self {
        Edge {
            source: NodeId::from(source),
            target: NodeId::from(target),
        }
    }

    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}

/// Find a node by id.
pub fn find_node<'a>(nodes: &'a [Node], id: &NodeId) -> Option<&'a Node> {
    nodes.iter().find(|n| &n.id == id)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_tag_parses_scalars_and_artifacts() {
        assert_eq!(TypeTag::parse("int"), TypeTag::Scalar(ScalarType::Int));
        assert_eq!(TypeTag::parse("string"), TypeTag::Scalar(ScalarType::String));
        assert_eq!(TypeTag::parse(""), TypeTag::Any);
        assert_eq!(TypeTag::parse("Model"), TypeTag::Artifact(ArtifactKind::Model));
        assert_eq!(
            TypeTag::parse("Output[Dataset]"),
            TypeTag::Output(ArtifactKind::Dataset)
        );
        assert_eq!(TypeTag::parse("Input[HTML]"), TypeTag::Input(ArtifactKind::Html));
    }

    #[test]
    fn unknown_types_are_carried_verbatim() {
        let t = TypeTag::parse("Output[Widget]");
        assert_eq!(t, TypeTag::Other("Output[Widget]".into()));
        assert_eq!(t.to_string(), "Output[Widget]");
    }

    #[test]
    fn consumed_type_flips_output_variant_only() {
        assert_eq!(
            TypeTag::Output(ArtifactKind::Model).as_consumed(),
            TypeTag::Input(ArtifactKind::Model)
        );
        assert_eq!(TypeTag::parse("float").as_consumed(), TypeTag::parse("float"));
        assert_eq!(
            TypeTag::Input(ArtifactKind::Dataset).as_consumed(),
            TypeTag::Input(ArtifactKind::Dataset)
        );
    }

    #[test]
    fn argument_serializes_with_mode_tag() {
        let arg = Argument::node_output("a1", "data", "node_0", Some("out"), TypeTag::Any);
        let json = serde_json::to_value(&arg).unwrap();
        assert_eq!(json["mode"], "node");
        assert_eq!(json["nodeId"], "node_0");
        assert_eq!(json["outputName"], "out");
        assert_eq!(json["type"], "Any");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn node_serializes_in_wire_shape() {
        let single = Node::new("n", "N").with_return_type(TypeTag::parse("int"));
        let single = serde_json::to_value(single).unwrap();
        assert_eq!(single["returnType"], "int");
        assert_eq!(single["outputs"], serde_json::json!([]));
        assert_eq!(single["componentType"], "python");

        let named = Node::new("n", "N").with_outputs(vec![OutputParam::new(
            "o",
            "m",
            TypeTag::parse("Output[Model]"),
        )]);
        let named = serde_json::to_value(named).unwrap();
        assert!(named.get("returnType").is_none());
        assert_eq!(named["outputs"][0]["type"], "Output[Model]");
    }

    #[test]
    fn returns_sole_type() {
        assert_eq!(
            Returns::Single(TypeTag::parse("int")).sole_type(),
            Some(&TypeTag::parse("int"))
        );
        let one = Returns::Named(vec![OutputParam::new("o", "x", TypeTag::parse("Output[Model]"))]);
        assert_eq!(one.sole_type(), Some(&TypeTag::parse("Output[Model]")));
        let two = Returns::Named(vec![
            OutputParam::new("o1", "x", TypeTag::Any),
            OutputParam::new("o2", "y", TypeTag::Any),
        ]);
        assert_eq!(two.sole_type(), None);
        assert_eq!(Returns::from_outputs(vec![], TypeTag::Any), Returns::Single(TypeTag::Any));
    }
}
