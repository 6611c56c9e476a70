/// Substitute `value` for every `placeholder` in `template`.
///
/// A template without the placeholder gets the value appended after a blank
/// line, so the model always sees the content it is asked about.
pub fn render_prompt(template: &str, placeholder: &str, value: &str) -> String {
    if template.contains(placeholder) {
        template.replace(placeholder, value)
    } else {
        format!("{}\n\n{}", template.trim_end(), value)
    }
}
