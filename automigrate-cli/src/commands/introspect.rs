//! `automigrate introspect` command - Print the live database schema.

use automigrate_core::{DatabaseSchema, SchemaIntrospector};

use crate::cli::{IntrospectArgs, SchemaOutputFormat};
use crate::config::Config;
use crate::connect;
use crate::error::CliResult;
use crate::output::success;

/// Run the introspect command
pub async fn run(config: &Config, args: IntrospectArgs) -> CliResult<()> {
    let provider = config.provider()?;
    let conn = connect::connect(config).await?;

    let schema = SchemaIntrospector::new(provider, config.introspection())
        .introspect(conn.as_ref())
        .await?;
    let rendered = render(&schema, args.format)?;

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, &rendered).await?;
            success(&format!(
                "Wrote {} table(s) to {}",
                schema.tables.len(),
                path.display()
            ));
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Render a schema in the requested format
pub fn render(schema: &DatabaseSchema, format: SchemaOutputFormat) -> CliResult<String> {
    let rendered = match format {
        SchemaOutputFormat::Toml => schema.to_toml_string()?,
        SchemaOutputFormat::Json => schema.to_json_string()?,
    };
    Ok(rendered)
}
