use crate::resource::{ResourceDesc, ResourceType};
use derive_more::Display;

/// Everything that can go wrong while building, compiling, allocating or running a render graph.
#[derive(Debug, Display)]
pub enum RenderGraphError {
    #[display("pass '{_0}' already exists in the graph")]
    DuplicatePassName(String),
    #[display("pass type '{_0}' is already registered")]
    DuplicatePassType(String),
    #[display("pass type '{pass_type}' declares port '{port}' twice")]
    DuplicatePortName { pass_type: String, port: String },
    #[display("unknown pass type '{_0}'")]
    UnknownPassType(String),
    #[display("unknown pass '{_0}'")]
    UnknownPass(String),
    #[display("pass '{pass}' has no {direction} port named '{port}'")]
    UnknownPort { pass: String, port: String, direction: PortDirection },
    #[display("no edge from '{src}' to '{dst}'")]
    UnknownEdge { src: String, dst: String },
    #[display("invalid pass name '{_0}'")]
    InvalidName(String),
    #[display("invalid port reference '{_0}', expected 'pass.port'")]
    InvalidPortRef(String),
    #[display("input '{port}' is already bound to '{bound_to}'")]
    PortAlreadyBound { port: String, bound_to: String },
    #[display("cannot connect '{src}' ({src_type}) to '{dst}' ({dst_type})")]
    TypeMismatch {
        src: String,
        src_type: ResourceType,
        dst: String,
        dst_type: ResourceType,
    },
    #[display("render graph contains a cycle: {}", chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },
    #[display("marked output '{_0}' cannot be scheduled")]
    UnreachableOutput(String),
    #[display("resource backend could not provide {desc}: {reason}")]
    ResourceExhausted { desc: ResourceDesc, reason: anyhow::Error },
    #[display("compiled plan is out of date (compiled at topology {plan_version}, graph is at {graph_version})")]
    StalePlan { plan_version: u64, graph_version: u64 },
    #[display("pass '{pass}' failed in frame {frame}: {source}")]
    PassError { pass: String, frame: u64, source: anyhow::Error },
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    #[display("input")]
    Input,
    #[display("output")]
    Output,
}

impl std::error::Error for RenderGraphError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let cause: &anyhow::Error = match self {
            RenderGraphError::ResourceExhausted { reason, .. } => reason,
            RenderGraphError::PassError { source, .. } => source,
            _ => return None,
        };
        let cause: &(dyn std::error::Error + 'static) = &**cause;
        Some(cause)
    }
}

/// Equality on the error kind and its identifying fields. Wrapped causes are not compared.
impl PartialEq for RenderGraphError {
    fn eq(&self, other: &Self) -> bool {
        use RenderGraphError::*;

        match (self, other) {
            (DuplicatePassName(a), DuplicatePassName(b))
            | (DuplicatePassType(a), DuplicatePassType(b))
            | (UnknownPassType(a), UnknownPassType(b))
            | (UnknownPass(a), UnknownPass(b))
            | (InvalidName(a), InvalidName(b))
            | (InvalidPortRef(a), InvalidPortRef(b))
            | (UnreachableOutput(a), UnreachableOutput(b)) => a == b,
            (
                DuplicatePortName { pass_type: a, port: p },
                DuplicatePortName { pass_type: b, port: q },
            ) => a == b && p == q,
            (
                UnknownPort { pass: a, port: p, direction: d },
                UnknownPort { pass: b, port: q, direction: e },
            ) => a == b && p == q && d == e,
            (UnknownEdge { src: a, dst: p }, UnknownEdge { src: b, dst: q }) => a == b && p == q,
            (
                PortAlreadyBound { port: a, bound_to: p },
                PortAlreadyBound { port: b, bound_to: q },
            ) => a == b && p == q,
            (
                TypeMismatch { src: a, src_type: at, dst: p, dst_type: pt },
                TypeMismatch { src: b, src_type: bt, dst: q, dst_type: qt },
            ) => a == b && at == bt && p == q && pt == qt,
            (CycleDetected { chain: a }, CycleDetected { chain: b }) => a == b,
            (ResourceExhausted { desc: a, .. }, ResourceExhausted { desc: b, .. }) => a == b,
            (
                StalePlan { plan_version: a, graph_version: p },
                StalePlan { plan_version: b, graph_version: q },
            ) => a == b && p == q,
            (PassError { pass: a, frame: p, .. }, PassError { pass: b, frame: q, .. }) => a == b && p == q,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::TextureFormat;

    #[test]
    fn test_error_display() {
        let err = RenderGraphError::UnknownPort {
            pass: "ToneMapper".into(),
            port: "color".into(),
            direction: PortDirection::Output,
        };
        assert_eq!(err.to_string(), "pass 'ToneMapper' has no output port named 'color'");

        let err = RenderGraphError::CycleDetected { chain: vec!["A".into(), "B".into(), "A".into()] };
        assert_eq!(err.to_string(), "render graph contains a cycle: A -> B -> A");

        let err = RenderGraphError::TypeMismatch {
            src: "GBuffer.depth".into(),
            src_type: ResourceType::Texture(TextureFormat::D32Float),
            dst: "Blit.src".into(),
            dst_type: ResourceType::Texture(TextureFormat::Rgba8Unorm),
        };
        assert_eq!(
            err.to_string(),
            "cannot connect 'GBuffer.depth' (Texture(D32Float)) to 'Blit.src' (Texture(Rgba8Unorm))"
        );
    }

    #[test]
    fn test_pass_error_source() {
        use std::error::Error;

        let err = RenderGraphError::PassError {
            pass: "SurfelGI".into(),
            frame: 4,
            source: anyhow::anyhow!("device lost"),
        };
        assert_eq!(err.to_string(), "pass 'SurfelGI' failed in frame 4: device lost");
        assert_eq!(err.source().unwrap().to_string(), "device lost");
    }
}
