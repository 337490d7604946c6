//! System prompt assembly.

use crate::dispatch::ToolSet;

const TOOL_USAGE: &str = r#"

To use a tool, include it in your response like this:
<tool>{"name": "tool_name", "params": {"param1": "value1"}}</tool>

You can use multiple tools by including multiple <tool>...</tool> blocks.
After using tools, provide your final response based on the tool results.

If a tool returns an error, acknowledge it and try to help without that tool."#;

/// The persona, followed by the tool catalog and usage instructions when
/// the agent has any tools.
pub fn build_system_prompt(persona: &str, tools: &ToolSet) -> String {
    if tools.is_empty() {
        return persona.to_string();
    }

    let mut prompt = String::from(persona);
    prompt.push_str("\n\nYou have access to the following tools:\n");
    for tool in tools.iter() {
        prompt.push_str("\n- ");
        prompt.push_str(tool.name());
        prompt.push_str(": ");
        prompt.push_str(tool.description());
    }
    prompt.push_str(TOOL_USAGE);
    prompt
}
