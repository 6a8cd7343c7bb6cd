use crate::prompts::registry::{PromptDefinition, PromptHandler};
use crate::protocol::PromptMessage;
use crate::schema::{FieldType, InputSchema, ValidatedArgs};

/// `generate-fake-user`: asks the model for a plausible user with a given name.
pub struct GenerateFakeUserPrompt;

impl PromptHandler for GenerateFakeUserPrompt {
    fn definition(&self) -> PromptDefinition {
        PromptDefinition {
            name: "generate-fake-user".into(),
            title: Some("Generate Fake User".into()),
            description: Some("Generate a fake user based on a given name".into()),
            arguments: InputSchema::new()
                .required("name", FieldType::String)
                .describe("Name of the user to generate"),
        }
    }

    fn render(&self, args: &ValidatedArgs) -> Vec<PromptMessage> {
        let name = args.get_str("name").unwrap_or_default();
        vec![PromptMessage::user_text(format!(
            "Generate a fake user with the name {}. The user should have a realistic email, \
             address, and phone number.",
            name
        ))]
    }
}
