//! Test description documents
//!
//! Renders the `testDescription` block of test files into a text document
//! for operators, walking manifests the same way a run does.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::discovery::{self, MANIFEST_EXTENSION, TEST_EXTENSION};
use super::report::COLUMN_WIDTH;
use crate::common::{Error, Result};
use crate::procedure::file::{ExampleDoc, TestFile};

pub const DEFAULT_OUTPUT: &str = "description.txt";

fn strip_commas(s: &str) -> String {
    s.replace(',', "")
}

fn or_missing(value: &str, missing: &str) -> String {
    if value.is_empty() {
        missing.to_string()
    } else {
        value.to_string()
    }
}

/// Render one test file's description
pub fn render(file: &TestFile) -> String {
    let desc = file.test_description.clone().unwrap_or_default();

    let arguments = desc
        .arguments
        .iter()
        .map(|arg| {
            format!(
                "{} -- {}",
                strip_commas(arg.name.as_deref().unwrap_or("Argument Name Not Available")),
                strip_commas(
                    arg.description
                        .as_deref()
                        .unwrap_or("Argument Description Not Available")
                )
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut examples = Vec::new();
    for example in &desc.examples {
        match example {
            ExampleDoc::Text(text) => examples.push(strip_commas(text)),
            ExampleDoc::Commands {
                description,
                commands,
            } => {
                if !commands.is_empty() {
                    examples.push(strip_commas(description));
                    examples.extend(commands.iter().map(|c| format!("  {c}")));
                }
            }
        }
    }

    let comments = desc
        .comments
        .iter()
        .map(|c| strip_commas(c))
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write!(
        out,
        "Command Name: {}\n\nVersion:  {}\nDescription:\n{}\nCommand:\n{}\nArguments:\n{}\n",
        or_missing(&file.command_name, "Test Name Not Available"),
        or_missing(&file.version, "Version Not Available"),
        desc.text.as_deref().unwrap_or("Test Description Not Available"),
        desc.command.as_deref().unwrap_or("Command Not Available"),
        arguments
    );
    if !comments.is_empty() {
        let _ = writeln!(out, "Comment:\n{comments}");
    }
    if !examples.is_empty() {
        let _ = writeln!(out, "Examples:\n{}", examples.join("\n"));
    }
    let _ = writeln!(out, "Writes to EEPROM: {}", if desc.eeprom { "True" } else { "False" });
    out
}

/// Section for one test file, or a note saying why it could not be read
fn section_for(path: &Path) -> String {
    match TestFile::load(path) {
        Ok(file) => format!(
            "\nDescription for {}:\n{}\n{}{}\n",
            path.display(),
            "-".repeat(COLUMN_WIDTH),
            render(&file),
            "=".repeat(COLUMN_WIDTH)
        ),
        Err(e) => format!("Error processing {}: {}", path.display(), e),
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}

/// Test files to describe for `input`
///
/// A directory is described through its manifests, falling back to its
/// loose test files when it has none.
fn targets(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_dir() {
        let mut entries = std::fs::read_dir(input)
            .map_err(|e| Error::file_read(input, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect::<Vec<_>>();
        entries.sort();

        let masters: Vec<_> = entries
            .iter()
            .filter(|p| has_extension(p, MANIFEST_EXTENSION))
            .collect();
        if masters.is_empty() {
            return Ok(entries
                .into_iter()
                .filter(|p| has_extension(p, TEST_EXTENSION))
                .collect());
        }
        return Ok(masters
            .into_iter()
            .flat_map(|m| discovery::expand_manifest(m))
            .collect());
    }

    match input.extension().and_then(|e| e.to_str()) {
        Some(MANIFEST_EXTENSION) => Ok(discovery::expand_manifest(input)),
        Some(TEST_EXTENSION) => Ok(vec![input.to_path_buf()]),
        _ => Err(Error::Config(
            "Invalid file type. Please provide a .master or .json file".to_string(),
        )),
    }
}

/// Build the description document for `input`
pub fn document(input: &Path) -> Result<String> {
    let mut out = String::new();
    for path in targets(input)? {
        tracing::debug!("Describing {}", path.display());
        out.push_str(&section_for(&path));
        out.push('\n');
    }
    Ok(out)
}

/// Write the description document for `input` to `output`, replacing it
pub fn write(input: &Path, output: &Path) -> Result<()> {
    let doc = document(input)?;
    std::fs::write(output, doc)?;
    tracing::info!("Descriptions have been written to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERS: &str = r#"{
        "version": "1.0",
        "commandName": "VERS",
        "testDescription": {
            "text": "Reports the firmware version",
            "command": "VERS",
            "arguments": [{"name": "none, really", "description": "no arguments"}],
            "examples": ["VERS", {"description": "with prefix", "commands": ["COM0 VERS"]}],
            "comments": ["Read only, safe"],
            "eeprom": false
        },
        "testProcedures": []
    }"#;

    #[test]
    fn test_render_full_description() {
        let text = render(&TestFile::from_json(VERS).unwrap());
        assert!(text.starts_with("Command Name: VERS\n\nVersion:  1.0\n"));
        assert!(text.contains("Arguments:\nnone really -- no arguments\n"));
        assert!(text.contains("Comment:\nRead only safe\n"));
        assert!(text.contains("Examples:\nVERS\nwith prefix\n  COM0 VERS\n"));
        assert!(text.ends_with("Writes to EEPROM: False\n"));
    }

    #[test]
    fn test_render_without_description() {
        let text = render(&TestFile::default());
        assert!(text.contains("Test Name Not Available"));
        assert!(text.contains("Test Description Not Available"));
        assert!(!text.contains("Examples:"));
    }

    #[test]
    fn test_document_through_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vers.json"), VERS).unwrap();
        std::fs::write(dir.path().join("loose.json"), "{}").unwrap();
        std::fs::write(
            dir.path().join("suite.master"),
            r#"{"json_files": ["vers.json", "missing.json"]}"#,
        )
        .unwrap();

        let out = dir.path().join("description.txt");
        std::fs::write(&out, "stale").unwrap();
        write(dir.path(), &out).unwrap();

        let doc = std::fs::read_to_string(&out).unwrap();
        assert!(!doc.contains("stale"));
        assert!(doc.contains("Command Name: VERS"));
        assert!(doc.contains("Error processing"));
        assert!(!doc.contains("loose.json"));
    }

    #[test]
    fn test_invalid_input_type() {
        assert!(document(Path::new("notes.txt")).is_err());
    }
}
