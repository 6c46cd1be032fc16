/* This Source Code Form is subject to the terms of the Mozilla Public
* License, v. 2.0. If a copy of the MPL was not distributed with this
* file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use glob::MatchOptions;
use std::collections::HashSet;

use super::commands::{
    GenerateExperimenterManifestCmd, GenerateSingleFileManifestCmd, GenerateStructCmd,
    PrintChannelsCmd, ValidateCmd,
};
use crate::error::FMLError::CliError;
use crate::frontend::ManifestFrontEnd;
use crate::{
    backends,
    error::{FMLError, Result},
    intermediate_representation::{FeatureManifest, TargetLanguage},
    parser::Parser,
    util::loaders::{FileLoader, FilePath, LoaderConfig},
};
use console::Term;
use std::path::Path;

/// Use this when recursively looking for files.
const MATCHING_FML_EXTENSION: &str = ".fml.yaml";

pub(crate) fn generate_struct(cmd: &GenerateStructCmd) -> Result<()> {
    let files: FileLoader = TryFrom::try_from(&cmd.loader)?;

    let filename = &cmd.manifest;
    let input = files.file_path(filename)?;

    match (&input, &cmd.output.is_dir()) {
        (FilePath::Remote(_), _) => generate_struct_single(&files, input, cmd),
        (FilePath::Local(file), _) if file.is_file() => generate_struct_single(&files, input, cmd),
        (FilePath::Local(dir), true) if dir.is_dir() => generate_struct_from_dir(&files, cmd, dir),
        (_, true) => generate_struct_from_glob(&files, cmd, filename),
        _ => Err(FMLError::CliError(
            "Cannot generate a single output file from an input directory".to_string(),
        )),
    }
}

fn generate_struct_from_dir(files: &FileLoader, cmd: &GenerateStructCmd, cwd: &Path) -> Result<()> {
    let entries = cwd.read_dir()?;
    for entry in entries.filter_map(Result::ok) {
        let pb = entry.path();
        if pb.is_dir() {
            generate_struct_from_dir(files, cmd, &pb)?;
        } else if let Some(nm) = pb.file_name().map(|s| s.to_str().unwrap_or_default()) {
            if nm.ends_with(MATCHING_FML_EXTENSION) {
                let path = pb.as_path().into();
                generate_struct_single(files, path, cmd)?;
            }
        }
    }
    Ok(())
}

fn generate_struct_from_glob(
    files: &FileLoader,
    cmd: &GenerateStructCmd,
    pattern: &str,
) -> Result<()> {
    use glob::glob_with;
    let entries = glob_with(pattern, MatchOptions::new()).unwrap();
    for entry in entries.filter_map(Result::ok) {
        let path = entry.as_path().into();
        generate_struct_single(files, path, cmd)?;
    }
    Ok(())
}

fn generate_struct_single(
    files: &FileLoader,
    manifest_path: FilePath,
    cmd: &GenerateStructCmd,
) -> Result<()> {
    let ir = load_feature_manifest(
        files.clone(),
        manifest_path,
        cmd.load_from_ir,
        Some(&cmd.channel),
    )?;
    generate_struct_from_ir(&ir, cmd)
}

fn generate_struct_from_ir(ir: &FeatureManifest, cmd: &GenerateStructCmd) -> Result<()> {
    let language = &cmd.language;
    ir.validate_manifest_for_lang(language)?;
    match language {
        TargetLanguage::IR => {
            let contents = serde_json::to_string_pretty(&ir)?;
            std::fs::write(&cmd.output, contents)?;
        }
        TargetLanguage::Kotlin => backends::kotlin::generate_struct(ir, cmd)?,
        TargetLanguage::Swift => backends::swift::generate_struct(ir, cmd)?,
        _ => unimplemented!(
            "Unsupported output language for structs: {}",
            language.extension()
        ),
    };
    Ok(())
}

pub(crate) fn generate_experimenter_manifest(cmd: &GenerateExperimenterManifestCmd) -> Result<()> {
    let files: FileLoader = TryFrom::try_from(&cmd.loader)?;
    let path = files.file_path(&cmd.manifest)?;
    let ir = load_feature_manifest(files, path, cmd.load_from_ir, None)?;
    backends::experimenter_manifest::generate_manifest(ir, cmd)?;
    Ok(())
}

pub(crate) fn generate_single_file_manifest(cmd: &GenerateSingleFileManifestCmd) -> Result<()> {
    let files: FileLoader = TryFrom::try_from(&cmd.loader)?;
    let path = files.file_path(&cmd.manifest)?;
    let fm = load_feature_manifest(files, path, false, Some(&cmd.channel))?;
    let frontend: ManifestFrontEnd = fm.into();
    std::fs::write(&cmd.output, serde_yaml::to_string(&frontend)?)?;
    Ok(())
}

fn load_feature_manifest(
    files: FileLoader,
    path: FilePath,
    load_from_ir: bool,
    channel: Option<&str>,
) -> Result<FeatureManifest> {
    let ir = if !load_from_ir {
        let parser: Parser = Parser::new(files, path)?;
        parser.get_intermediate_representation(channel)?
    } else {
        let string = files.read_to_string(&path)?;
        serde_json::from_str::<FeatureManifest>(&string)?
    };
    ir.validate_manifest()?;
    Ok(ir)
}

pub(crate) fn fetch_file(files: &LoaderConfig, nm: &str) -> Result<()> {
    let files: FileLoader = files.try_into()?;
    let file = files.file_path(nm)?;

    let string = files.read_to_string(&file)?;

    println!("{}", string);
    Ok(())
}

fn output_ok(term: &Term, title: &str) -> Result<()> {
    let style = term.style().green();
    term.write_line(&format!("✅ {}", style.apply_to(title)))?;
    Ok(())
}

fn output_note(term: &Term, title: &str) -> Result<()> {
    let style = term.style().yellow();
    term.write_line(&format!("ℹ️ {}", style.apply_to(title)))?;
    Ok(())
}

fn output_err(term: &Term, title: &str, detail: &str) -> Result<()> {
    let style = term.style().red();
    term.write_line(&format!("❎ {}: {detail}", style.apply_to(title),))?;
    Ok(())
}

pub(crate) fn validate(cmd: &ValidateCmd) -> Result<()> {
    let term = Term::stdout();

    let files: FileLoader = TryFrom::try_from(&cmd.loader)?;

    let filename = &cmd.manifest;
    let file_path = files.file_path(filename)?;
    let parser: Parser = Parser::new(files, file_path.clone())?;
    let mut loading = HashSet::new();
    let manifest_front_end = parser.load_manifest(&file_path, &mut loading)?;

    let iter_includes = loading.iter().map(|id| id.to_string());

    let channels = manifest_front_end.channels();
    if channels.is_empty() {
        output_note(
            &term,
            &format!(
                "Loaded modules:\n- {}\n",
                iter_includes.collect::<Vec<String>>().join("\n- ")
            ),
        )?;
        output_ok(&term, &format!(
            "{}\n{}\n{}",
            "The manifest is valid for including in other files. To be imported, or used as an app manifest, it requires the following:",
            "- A `channels` list",
            "- An `about` block",
        ))?;
        return Ok(());
    }
    let intermediate_representation =
        parser.get_intermediate_representation(None).map_err(|e| {
            output_err(&term, "Manifest is invalid", &e.to_string()).unwrap();
            e
        })?;

    output_note(
        &term,
        &format!(
            "Loaded modules:\n- {}\n",
            iter_includes
                .chain(
                    intermediate_representation
                        .all_imports
                        .keys()
                        .map(|m| m.to_string())
                )
                .collect::<Vec<String>>()
                .join("\n- ")
        ),
    )?;

    term.write_line("Validating manifest for different channels:")?;

    let results = channels
        .iter()
        .map(|c| {
            let intermediate_representation = parser.get_intermediate_representation(Some(c));
            match intermediate_representation {
                Ok(ir) => (c, ir.validate_manifest()),
                Err(e) => (c, Err(e)),
            }
        })
        .collect::<Vec<(&String, Result<_>)>>();

    let mut error_count = 0;
    for (channel, result) in results {
        match result {
            Ok(_) => {
                output_ok(&term, &format!("{channel:.<20}valid"))?;
            }
            Err(e) => {
                error_count += 1;
                output_err(&term, &format!("{channel:.<20}invalid"), &e.to_string())?;
            }
        };
    }

    if error_count > 0 {
        return Err(CliError(format!(
            "Manifest contains error(s) in {} channel{}",
            error_count,
            if error_count > 1 { "s" } else { "" }
        )));
    }

    Ok(())
}

pub(crate) fn print_channels(cmd: &PrintChannelsCmd) -> Result<()> {
    let files = TryFrom::try_from(&cmd.loader)?;
    let manifest = Parser::load_frontend(files, &cmd.manifest)?;
    let channels = manifest.channels();
    if cmd.as_json {
        let json = serde_json::Value::from(channels);
        println!("{}", json);
    } else {
        println!("{}", channels.join("\n"));
    }
    Ok(())
}
