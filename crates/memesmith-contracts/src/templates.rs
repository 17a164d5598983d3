use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateRef {
    pub id: &'static str,
    pub name: &'static str,
    pub url: &'static str,
}

pub const TEMPLATES: &[TemplateRef] = &[
    TemplateRef {
        id: "1",
        name: "cat",
        url: "https://picsum.photos/seed/cat/400/400",
    },
    TemplateRef {
        id: "2",
        name: "dog",
        url: "https://picsum.photos/seed/dog/400/400",
    },
    TemplateRef {
        id: "3",
        name: "office",
        url: "https://picsum.photos/seed/office/400/400",
    },
    TemplateRef {
        id: "4",
        name: "computer",
        url: "https://picsum.photos/seed/computer/400/400",
    },
];

/// Looks a template up by id, or by name as a convenience for the CLI.
pub fn find_template(key: &str) -> Option<&'static TemplateRef> {
    let key = key.trim();
    TEMPLATES
        .iter()
        .find(|template| template.id == key)
        .or_else(|| {
            TEMPLATES
                .iter()
                .find(|template| template.name.eq_ignore_ascii_case(key))
        })
}
