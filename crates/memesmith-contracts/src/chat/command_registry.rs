#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    /// Key the raw argument is stored under in `Intent::command_args`.
    pub arg_key: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "url",
        action: "acquire_url",
        arg_key: "url",
    },
    CommandSpec {
        command: "template",
        action: "acquire_template",
        arg_key: "template",
    },
    CommandSpec {
        command: "select",
        action: "select_caption",
        arg_key: "caption",
    },
    CommandSpec {
        command: "edit",
        action: "edit_image",
        arg_key: "instruction",
    },
    CommandSpec {
        command: "mode",
        action: "set_mode",
        arg_key: "mode",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "acquire_file",
        arg_key: "path",
    },
    CommandSpec {
        command: "save",
        action: "save_image",
        arg_key: "path",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "templates",
        action: "list_templates",
        arg_key: "",
    },
    CommandSpec {
        command: "captions",
        action: "generate_captions",
        arg_key: "",
    },
    CommandSpec {
        command: "caption",
        action: "generate_captions",
        arg_key: "",
    },
    CommandSpec {
        command: "clear_caption",
        action: "clear_caption",
        arg_key: "",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
        arg_key: "",
    },
    CommandSpec {
        command: "status",
        action: "status",
        arg_key: "",
    },
    CommandSpec {
        command: "wait",
        action: "wait",
        arg_key: "",
    },
    CommandSpec {
        command: "help",
        action: "help",
        arg_key: "",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/upload",
    "/url",
    "/template",
    "/templates",
    "/captions",
    "/select",
    "/clear_caption",
    "/edit",
    "/mode",
    "/reset",
    "/save",
    "/status",
    "/wait",
    "/help",
];
