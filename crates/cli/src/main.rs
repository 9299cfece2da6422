use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use concerto_core::{ModelFile, ModelManager};
use concerto_runtime::{DeserializeOptions, SerializeOptions, Serializer};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Concerto model language toolchain.
#[derive(Parser)]
#[command(name = "concerto", version, about = "Concerto model language toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a set of .cto model files as one batch
    Validate {
        /// Paths to the .cto model files
        files: Vec<PathBuf>,
    },

    /// List the declarations in a set of .cto model files
    Inspect {
        /// Paths to the .cto model files
        files: Vec<PathBuf>,
        /// Restrict the listing to one namespace
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Deserialize an instance JSON file against the models and print its
    /// canonical serialized form
    Roundtrip {
        /// Paths to the .cto model files
        files: Vec<PathBuf>,
        /// Path to the instance JSON file
        #[arg(long)]
        instance: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(()) => 0,
        Err(message) => {
            eprintln!("error: {}", message);
            1
        }
    };
    process::exit(code);
}

fn run(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Commands::Validate { files } => {
            let mm = load_models(files)?;
            match cli.output {
                OutputFormat::Text => {
                    for ns in mm.namespaces() {
                        println!("{}: ok", ns);
                    }
                }
                OutputFormat::Json => {
                    let namespaces: Vec<&str> = mm.namespaces();
                    println!(
                        "{}",
                        serde_json::json!({ "valid": true, "namespaces": namespaces })
                    );
                }
            }
            Ok(())
        }
        Commands::Inspect { files, namespace } => {
            let mm = load_models(files)?;
            inspect(&mm, namespace.as_deref(), cli.output)
        }
        Commands::Roundtrip { files, instance } => {
            let mm = load_models(files)?;
            let text = std::fs::read_to_string(instance)
                .map_err(|e| format!("{}: {}", instance.display(), e))?;
            let json: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| format!("{}: {}", instance.display(), e))?;

            let serializer = Serializer::new(&mm);
            let resource = serializer
                .from_json(&json, DeserializeOptions::default())
                .map_err(|e| e.to_string())?;
            let canonical = serializer
                .to_json(&resource, SerializeOptions::default())
                .map_err(|e| e.to_string())?;
            println!(
                "{}",
                serde_json::to_string_pretty(&canonical).expect("canonical JSON is printable")
            );
            Ok(())
        }
    }
}

/// Parse every file and register them as one transactional batch, so the
/// files may reference each other in any order.
fn load_models(files: &[PathBuf]) -> Result<ModelManager, String> {
    if files.is_empty() {
        return Err("no model files given".to_owned());
    }
    let mut parsed = Vec::with_capacity(files.len());
    for path in files {
        let text =
            std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        let file = ModelFile::from_text(&text, path.to_str()).map_err(|e| e.to_string())?;
        parsed.push(file);
    }
    let mut mm = ModelManager::new();
    mm.add_model_files(parsed).map_err(|e| e.to_string())?;
    Ok(mm)
}

fn inspect(
    mm: &ModelManager,
    namespace: Option<&str>,
    output: OutputFormat,
) -> Result<(), String> {
    let files: Vec<&ModelFile> = match namespace {
        Some(ns) => vec![mm
            .get_model_file(ns)
            .ok_or_else(|| format!("namespace '{}' is not in the given models", ns))?],
        None => mm.model_files().collect(),
    };

    match output {
        OutputFormat::Text => {
            for file in files {
                for decl in file.declarations() {
                    let mut line = format!(
                        "{} {}",
                        decl.kind().keyword(),
                        decl.fully_qualified_name()
                    );
                    if decl.is_abstract() {
                        line = format!("abstract {}", line);
                    }
                    if let Some(id) = decl.identifier_field_name(mm).map_err(|e| e.to_string())? {
                        line.push_str(&format!(" identified by {}", id));
                    }
                    if let Some(super_fqn) =
                        decl.super_type_fqn(mm).map_err(|e| e.to_string())?
                    {
                        line.push_str(&format!(" extends {}", super_fqn));
                    }
                    println!("{}", line);
                    for property in decl.own_properties() {
                        let suffix = if property.array { "[]" } else { "" };
                        let optional = if property.is_optional() { " optional" } else { "" };
                        let marker = if property.is_relationship() { "-->" } else { "o" };
                        println!(
                            "  {} {}{} {}{}",
                            marker, property.type_name, suffix, property.name, optional
                        );
                    }
                }
            }
        }
        OutputFormat::Json => {
            let mut decls = Vec::new();
            for file in files {
                for decl in file.declarations() {
                    let properties: Vec<serde_json::Value> = decl
                        .own_properties()
                        .iter()
                        .map(|p| {
                            serde_json::json!({
                                "name": p.name,
                                "type": p.type_name,
                                "array": p.array,
                                "optional": p.is_optional(),
                                "relationship": p.is_relationship(),
                            })
                        })
                        .collect();
                    decls.push(serde_json::json!({
                        "kind": decl.kind().keyword(),
                        "fqn": decl.fully_qualified_name(),
                        "abstract": decl.is_abstract(),
                        "identifier": decl.identifier_field_name(mm).map_err(|e| e.to_string())?,
                        "superType": decl.super_type_fqn(mm).map_err(|e| e.to_string())?,
                        "properties": properties,
                    }));
                }
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "declarations": decls }))
                    .expect("declaration JSON is printable")
            );
        }
    }
    Ok(())
}
