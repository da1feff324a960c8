use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::error::{CsubError, Result};

/// Render an embedded template with TinyTemplate
///
/// Values are substituted verbatim (no HTML escaping). A placeholder that isn't a field of
/// `context` is an error, never an empty string.
pub fn render<C: Serialize>(name: &'static str, template: &'static str, context: &C) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(name, template)
        .map_err(|source| CsubError::Template { name, source })?;
    tt.render(name, context)
        .map_err(|source| CsubError::Template { name, source })
}
