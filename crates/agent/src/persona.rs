//! The pre-sales assistant persona shared by provisioning and every run.

use crate::assistant::{AssistantSpec, FunctionDeclaration, RunSpec};
use crate::tools::standard_declarations;

pub const ASSISTANT_NAME: &str = "Assistente SDR Verzel";
pub const MODEL: &str = "gpt-4o";
pub const INSTRUCTIONS: &str = "Você é um assistente de pré-vendas (SDR) amigável e eficiente. \
Sua principal função é conversar com leads, entender suas necessidades, coletar informações \
básicas (nome, e-mail, empresa) e, se eles demonstrarem interesse explícito em comprar ou \
contratar, agendar uma reunião. Seja sempre profissional e empático.";

pub fn assistant_spec() -> AssistantSpec {
    AssistantSpec {
        name: ASSISTANT_NAME.to_string(),
        model: MODEL.to_string(),
        instructions: INSTRUCTIONS.to_string(),
        tools: standard_declarations(),
    }
}

/// Every run restates the persona and the tools the local registry can
/// actually execute.
pub fn run_spec(assistant_id: impl Into<String>, tools: Vec<FunctionDeclaration>) -> RunSpec {
    RunSpec { assistant_id: assistant_id.into(), instructions: Some(INSTRUCTIONS.to_string()), tools }
}

#[cfg(test)]
mod tests {
    use super::{assistant_spec, run_spec, INSTRUCTIONS};

    #[test]
    fn instructions_read_as_one_paragraph() {
        assert!(INSTRUCTIONS.starts_with("Você é um assistente de pré-vendas (SDR)"));
        assert!(INSTRUCTIONS.contains("coletar informações básicas (nome, e-mail, empresa)"));
        assert!(!INSTRUCTIONS.contains("  "));
    }

    #[test]
    fn run_spec_carries_persona_and_given_tools() {
        let spec = run_spec("asst_123", assistant_spec().tools[..1].to_vec());
        assert_eq!(spec.assistant_id, "asst_123");
        assert_eq!(spec.instructions.as_deref(), Some(INSTRUCTIONS));
        assert_eq!(spec.tools.len(), 1);
        assert_eq!(spec.tools[0].name, "registrarLead");
    }

    #[test]
    fn provisioned_assistant_declares_the_three_sales_tools() {
        let names: Vec<_> = assistant_spec().tools.into_iter().map(|tool| tool.name).collect();
        assert_eq!(names, vec!["registrarLead", "oferecerHorarios", "agendarReuniao"]);
    }
}
