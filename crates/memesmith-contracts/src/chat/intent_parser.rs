use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{CommandSpec, NO_ARG_COMMANDS, RAW_ARG_COMMANDS, SINGLE_PATH_COMMANDS};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }

    /// String argument by key, empty when absent.
    pub fn arg(&self, key: &str) -> &str {
        self.command_args
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

fn find_spec(command: &str, specs: &'static [CommandSpec]) -> Option<&'static CommandSpec> {
    specs.iter().find(|spec| spec.command == command)
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(spec) = find_spec(&command, RAW_ARG_COMMANDS) {
                let mut intent = Intent::new(spec.action, text);
                intent
                    .command_args
                    .insert(spec.arg_key.to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(spec) = find_spec(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(spec.action, text);
                intent.command_args.insert(
                    spec.arg_key.to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(spec) = find_spec(&command, NO_ARG_COMMANDS) {
                return Intent::new(spec.action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("prompt", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn blank_input_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
        assert_eq!(parse_intent("").action, "noop");
    }

    #[test]
    fn parse_upload_with_quoted_path() {
        let intent = parse_intent("/upload \"/tmp/my cat.png\"");
        assert_eq!(intent.action, "acquire_file");
        assert_eq!(intent.command_args["path"], json!("/tmp/my cat.png"));

        let plain = parse_intent("/upload cat.jpg");
        assert_eq!(plain.arg("path"), "cat.jpg");
    }

    #[test]
    fn parse_save_without_path_keeps_empty_arg() {
        let intent = parse_intent("/save");
        assert_eq!(intent.action, "save_image");
        assert_eq!(intent.arg("path"), "");
    }

    #[test]
    fn parse_raw_argument_commands() {
        let edit = parse_intent("/edit   add sunglasses to the cat  ");
        assert_eq!(edit.action, "edit_image");
        assert_eq!(edit.arg("instruction"), "add sunglasses to the cat");

        let select = parse_intent("/select #2");
        assert_eq!(select.action, "select_caption");
        assert_eq!(select.arg("caption"), "#2");

        let template = parse_intent("/template office");
        assert_eq!(template.action, "acquire_template");
        assert_eq!(template.arg("template"), "office");

        let url = parse_intent("/url https://example.test/a.png");
        assert_eq!(url.action, "acquire_url");
        assert_eq!(url.arg("url"), "https://example.test/a.png");

        let mode = parse_intent("/MODE edit");
        assert_eq!(mode.action, "set_mode");
        assert_eq!(mode.arg("mode"), "edit");
    }

    #[test]
    fn parse_edit_without_instruction_keeps_empty_arg() {
        let edit = parse_intent("/edit");
        assert_eq!(edit.action, "edit_image");
        assert_eq!(edit.arg("instruction"), "");
    }

    #[test]
    fn parse_no_arg_commands() {
        assert_eq!(parse_intent("/captions").action, "generate_captions");
        assert_eq!(parse_intent("/caption").action, "generate_captions");
        assert_eq!(parse_intent("/templates").action, "list_templates");
        assert_eq!(parse_intent("/clear_caption").action, "clear_caption");
        assert_eq!(parse_intent("/reset").action, "reset");
        assert_eq!(parse_intent("/status").action, "status");
        assert_eq!(parse_intent("/wait").action, "wait");
        assert_eq!(parse_intent("/help").action, "help");
    }

    #[test]
    fn plain_text_becomes_prompt() {
        let intent = parse_intent("  make it look like an oil painting ");
        assert_eq!(intent.action, "prompt");
        assert_eq!(
            intent.prompt.as_deref(),
            Some("make it look like an oil painting")
        );
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
