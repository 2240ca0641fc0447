//! Glue between the command line and the library: merges flags with the
//! optional job file, runs the search and the replacement, prints the summary.

use crate::binding::{Binding, Bindings};
use crate::cli::SearchArgs;
use crate::config::{
    Concurrency, ConfigLoader, Delimiters, ExtensionFilter, JobConfig, ParameterSpec, SearchConfig,
};
use crate::errors::{Error, Result};
use crate::file_locator::FileSearcher;
use crate::fs::{FileSystem, OsFileSystem};
use crate::replacer::{MatchMode, ProgressCadence, ReplaceOptions, Replacer};
use crate::report::{ChangeReport, ReportFormat, ReportWriter};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Replacement flags that are not about the search itself.
#[derive(Debug, Clone, Default)]
pub struct ReplaceFlags {
    pub parameters: Vec<String>,
    pub exact_word: bool,
    pub ignore_case: bool,
    pub start_marker: Option<String>,
    pub end_marker: Option<String>,
    pub dry_run: bool,
    pub report: Option<PathBuf>,
    pub report_format: Option<ReportFormat>,
    pub verbose: bool,
}

/// The main entry point for the `find` command.
pub fn run_find(search: SearchArgs) -> Result<()> {
    let job = load_job(&search)?;
    let (config, extensions) = build_search(&search, &job)?;
    let mut files = FileSearcher::new(&OsFileSystem, config, extensions).search()?;
    files.sort();
    for file in &files {
        println!("{}", file.display());
    }
    Ok(())
}

/// The main entry point for the `replace` command.
///
/// 1. Merges the command-line flags with the job file, flags taking precedence.
/// 2. Finds the files to process.
/// 3. Rewrites them in parallel, driving a progress bar.
/// 4. Prints summary statistics and writes the optional change report.
pub fn run_replace(search: SearchArgs, flags: ReplaceFlags) -> Result<()> {
    let started = Instant::now();
    let job = load_job(&search)?;
    let (config, extensions) = build_search(&search, &job)?;
    let concurrency = config.concurrency();
    let bindings = build_bindings(&flags.parameters, job.parameters.as_ref())?;
    if bindings.is_empty() {
        return Err(Error::Configuration(
            "No variable replacements provided.".to_string(),
        ));
    }
    let mode = build_mode(&flags, &job)?;
    let ignore_case = flags.ignore_case || job.ignore_case.unwrap_or(false);

    info!("Searching files ...");
    let files = FileSearcher::new(&OsFileSystem, config, extensions).search()?;
    info!("Number of files found: {}", files.len());
    if files.is_empty() {
        return Ok(());
    }

    let replacer = Replacer::new(ReplaceOptions {
        bindings,
        mode,
        ignore_case,
        concurrency,
        progress: ProgressCadence::for_total(files.len()),
    })?;

    if flags.dry_run {
        return preview(&OsFileSystem, &replacer, &files);
    }

    info!("Replacement starting ...");
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map_err(|e| Error::Configuration(e.to_string()))?
            .progress_chars("##-"),
    );

    let report = ChangeReport::new();
    let changed = replacer.substitute(
        &OsFileSystem,
        &files,
        |event| {
            if flags.verbose {
                info!(
                    "Changed | {} | {} for {}",
                    event.path.display(),
                    event.binding.name(),
                    event.binding.value()
                );
            }
            report.record(event);
        },
        |total, processed| {
            pb.set_length(total as u64);
            pb.set_position(processed as u64);
        },
    );
    let changed = match changed {
        Ok(changed) => changed,
        Err(e) => {
            pb.abandon_with_message("Replacement aborted");
            // Files rewritten before the failure stay rewritten; say which.
            if let Err(finish_err) = finish(&flags, files.len(), &report, false) {
                warn!("Could not report the changes made before the failure: {finish_err}");
            }
            return Err(e);
        }
    };
    pb.finish_with_message("Replacement complete");
    finish(&flags, files.len(), &report, changed)?;

    info!("Execution time {:.2}s", started.elapsed().as_secs_f64());
    Ok(())
}

/// Prints the summary block and writes the optional report.
fn finish(flags: &ReplaceFlags, found: usize, report: &ChangeReport, changed: bool) -> Result<()> {
    let records = report.records();
    let mut changed_files: Vec<&Path> = records.iter().map(|r| r.file.as_path()).collect();
    changed_files.dedup();

    println!("\n{}", "-".repeat(50));
    println!("Files found   : {found}");
    println!("Files changed : {}", changed_files.len());
    println!("Substitutions : {}", records.len());
    if !changed && records.is_empty() {
        println!("No placeholder matched any binding.");
    }

    if let Some(path) = &flags.report {
        let format = flags.report_format.unwrap_or(ReportFormat::Text);
        let mut writer = BufWriter::new(File::create(path)?);
        ReportWriter::new(format, true).write_output(&mut writer, report)?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}

/// Prints the files a run would rewrite, and how many substitutions each
/// would get, without writing anything.
fn preview(fs: &dyn FileSystem, replacer: &Replacer, files: &[PathBuf]) -> Result<()> {
    let mut would_change = 0;
    let mut total = 0;
    for path in files {
        let content = fs.read_text(path).map_err(|e| e.in_file(path))?;
        let substitution = replacer.replace_text(&content);
        if substitution.changed() {
            would_change += 1;
            total += substitution.applied.len();
            println!(
                "DRY Modified {} ({} changes)",
                path.display(),
                substitution.applied.len()
            );
        }
    }

    println!("\n{}", "-".repeat(50));
    println!("Files found   : {}", files.len());
    println!("Files to change: {would_change}");
    println!("Substitutions : {total}");
    Ok(())
}

fn load_job(search: &SearchArgs) -> Result<JobConfig> {
    let Some(config_path) = &search.config else {
        return Ok(JobConfig::default());
    };

    let working_dir = search.folder.clone().unwrap_or_else(|| PathBuf::from("."));
    let resolved = ConfigLoader::find_config(config_path, &working_dir)?;
    info!("Using job file: {}", resolved.display());
    ConfigLoader::load_job_config(&resolved)
}

fn build_search(search: &SearchArgs, job: &JobConfig) -> Result<(SearchConfig, ExtensionFilter)> {
    let folder = search
        .folder
        .clone()
        .or_else(|| job.folder.clone())
        .ok_or_else(|| Error::Configuration("directory must be set before searching".to_string()))?;

    let extensions = if search.extensions.is_empty() {
        ExtensionFilter::new(&job.extensions)
    } else {
        ExtensionFilter::new(&search.extensions)
    };
    if extensions.is_empty() {
        warn!("No extension given, every file will be processed");
    }

    let excluded = if search.ignore_folder_names.is_empty() {
        &job.exclude
    } else {
        &search.ignore_folder_names
    };

    let recurse = !search.no_subfolders && job.include_subfolders.unwrap_or(true);

    let concurrency = match search.parallel.map(usize::from).or(job.parallel) {
        Some(limit) => Concurrency::new(limit)?,
        None => Concurrency::default(),
    };

    let config = SearchConfig::new(folder)?
        .with_recurse(recurse)
        .with_excluded(excluded)
        .with_concurrency(concurrency);
    Ok((config, extensions))
}

/// Command-line parameters come first so they win over the job file.
fn build_bindings(parameters: &[String], from_job: Option<&ParameterSpec>) -> Result<Bindings> {
    let mut bindings = Bindings::new();
    for raw in parameters {
        bindings.extend_from_str(raw)?;
    }
    match from_job {
        Some(ParameterSpec::Map(map)) => {
            for (name, value) in map {
                bindings.push(Binding::new(name, value)?);
            }
        }
        Some(ParameterSpec::List(list)) => {
            for raw in list {
                bindings.extend_from_str(raw)?;
            }
        }
        None => {}
    }
    Ok(bindings)
}

fn build_mode(flags: &ReplaceFlags, job: &JobConfig) -> Result<MatchMode> {
    if flags.exact_word || job.exact_word.unwrap_or(false) {
        return Ok(MatchMode::ExactWord);
    }

    let delimiters = match (&flags.start_marker, &flags.end_marker, &job.delimiters) {
        (Some(start), Some(end), _) => Delimiters::new(start.as_str(), end.as_str())?,
        (None, None, Some(markers)) => Delimiters::new(markers.start.as_str(), markers.end.as_str())?,
        (None, None, None) => Delimiters::default(),
        _ => {
            return Err(Error::InvalidArgument(
                "start and end markers must be given together".to_string(),
            ));
        }
    };
    Ok(MatchMode::Delimited(delimiters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkerSpec;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_command_line_parameters_win() {
        let mut map = BTreeMap::new();
        map.insert("Env".to_string(), "dev".to_string());
        map.insert("Port".to_string(), "80".to_string());

        let bindings =
            build_bindings(&["Env=prod".to_string()], Some(&ParameterSpec::Map(map))).unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings.find("Env", false).unwrap().value(), "prod");
        assert_eq!(bindings.find("Port", false).unwrap().value(), "80");
    }

    #[test]
    fn test_build_search_falls_back_to_job() {
        let temp_dir = TempDir::new().unwrap();
        let job = JobConfig {
            folder: Some(temp_dir.path().to_path_buf()),
            extensions: vec!["*.json".to_string()],
            exclude: vec!["bin".to_string()],
            parallel: Some(2),
            include_subfolders: Some(false),
            ..Default::default()
        };

        let (config, extensions) = build_search(&SearchArgs::default(), &job).unwrap();
        assert_eq!(config.root(), temp_dir.path());
        assert!(!config.recurse());
        assert!(config.excluded().contains("BIN"));
        assert_eq!(config.concurrency().get(), 2);
        assert_eq!(extensions.extensions(), ["json"]);
    }

    #[test]
    fn test_build_search_requires_folder() {
        let result = build_search(&SearchArgs::default(), &JobConfig::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_build_mode() {
        let exact = ReplaceFlags {
            exact_word: true,
            ..Default::default()
        };
        assert_eq!(build_mode(&exact, &JobConfig::default()).unwrap(), MatchMode::ExactWord);

        let job = JobConfig {
            delimiters: Some(MarkerSpec {
                start: "#{".to_string(),
                end: "}#".to_string(),
            }),
            ..Default::default()
        };
        assert_eq!(
            build_mode(&ReplaceFlags::default(), &job).unwrap(),
            MatchMode::Delimited(Delimiters::new("#{", "}#").unwrap())
        );
        assert_eq!(
            build_mode(&ReplaceFlags::default(), &JobConfig::default()).unwrap(),
            MatchMode::default()
        );
    }

    #[test]
    fn test_run_replace_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("src/app.json"), r#"{"env": "${Env}"}"#).unwrap();
        fs::write(root.join("bin/app.json"), r#"{"env": "${Env}"}"#).unwrap();
        let report_path = root.join("report.csv");

        let search = SearchArgs {
            folder: Some(root.to_path_buf()),
            extensions: vec!["json".to_string()],
            ignore_folder_names: vec!["bin".to_string()],
            ..Default::default()
        };
        let flags = ReplaceFlags {
            parameters: vec!["Env=prod".to_string()],
            report: Some(report_path.clone()),
            report_format: Some(ReportFormat::Csv),
            ..Default::default()
        };
        run_replace(search, flags).unwrap();

        assert_eq!(
            fs::read_to_string(root.join("src/app.json")).unwrap(),
            r#"{"env": "prod"}"#
        );
        assert_eq!(
            fs::read_to_string(root.join("bin/app.json")).unwrap(),
            r#"{"env": "${Env}"}"#
        );
        let report = fs::read_to_string(report_path).unwrap();
        assert!(report.contains("app.json,Env,prod"));
    }

    #[test]
    fn test_aborted_run_still_reports_rewritten_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), "${Env}").unwrap();
        fs::write(root.join("sub/b.txt"), [0xff, 0xfe]).unwrap();
        let out_dir = TempDir::new().unwrap();
        let report_path = out_dir.path().join("report.txt");

        let search = SearchArgs {
            folder: Some(root.to_path_buf()),
            parallel: Some(1),
            ..Default::default()
        };
        let flags = ReplaceFlags {
            parameters: vec!["Env=prod".to_string()],
            report: Some(report_path.clone()),
            ..Default::default()
        };
        let result = run_replace(search, flags);

        assert!(matches!(result, Err(Error::Processing { .. })));
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "prod");
        let report = fs::read_to_string(report_path).unwrap();
        assert!(report.contains("a.txt | Env for prod"));
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "${Name}").unwrap();

        let search = SearchArgs {
            folder: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let flags = ReplaceFlags {
            parameters: vec!["Name=Alice".to_string()],
            dry_run: true,
            ..Default::default()
        };
        run_replace(search, flags).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "${Name}");
    }
}
