use crate::binding::{Binding, Bindings};
use crate::config::{Concurrency, Delimiters};
use crate::errors::{Error, Result};
use crate::fs::FileSystem;
use rayon::prelude::*;
use regex::{Captures, Regex, RegexBuilder};
use regex_syntax::is_word_character;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

/// How placeholders are recognised in file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchMode {
    /// `<start>Name<end>` tokens, e.g. `${Name}`. Only the marker-wrapped
    /// name is looked up; unknown tokens are left as they are.
    Delimited(Delimiters),
    /// The binding name itself, matched as a whole word.
    ExactWord,
}

impl Default for MatchMode {
    fn default() -> Self {
        MatchMode::Delimited(Delimiters::default())
    }
}

/// How often the progress callback fires: after every `n`-th processed file,
/// plus once when the run completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressCadence(NonZeroUsize);

impl ProgressCadence {
    pub fn every(n: usize) -> Result<Self> {
        NonZeroUsize::new(n)
            .map(Self)
            .ok_or_else(|| Error::InvalidArgument("progress interval must be greater than 0".to_string()))
    }

    /// Every 5% of `total` files, at least every file.
    pub fn for_total(total: usize) -> Self {
        let step = total.div_ceil(20).max(1);
        Self(NonZeroUsize::new(step).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }

    fn is_due(self, processed: usize) -> bool {
        processed % self.0.get() == 0
    }
}

impl Default for ProgressCadence {
    fn default() -> Self {
        Self(NonZeroUsize::MIN)
    }
}

/// One applied substitution.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent<'a> {
    pub path: &'a Path,
    pub binding: &'a Binding,
}

/// Everything a [`Replacer`] needs, fixed before the first file is touched.
#[derive(Debug, Clone, Default)]
pub struct ReplaceOptions {
    pub bindings: Bindings,
    pub mode: MatchMode,
    pub ignore_case: bool,
    pub concurrency: Concurrency,
    pub progress: ProgressCadence,
}

/// The result of transforming one piece of text.
#[derive(Debug)]
pub struct Substitution<'r> {
    /// The rewritten text.
    pub text: String,
    /// One entry per replaced occurrence, in the order they were applied.
    pub applied: Vec<&'r Binding>,
}

impl Substitution<'_> {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Core engine for rewriting placeholders in files.
///
/// The matching regexes are compiled once in [`Replacer::new`]; files are
/// then rewritten in parallel by [`Replacer::substitute`].
pub struct Replacer {
    bindings: Bindings,
    mode: MatchMode,
    ignore_case: bool,
    concurrency: Concurrency,
    progress: ProgressCadence,
    /// The token regex in delimited mode, one regex per binding otherwise.
    patterns: Vec<Regex>,
}

impl Replacer {
    pub fn new(options: ReplaceOptions) -> Result<Self> {
        let patterns = match &options.mode {
            MatchMode::Delimited(delimiters) => vec![delimited_pattern(delimiters, options.ignore_case)?],
            MatchMode::ExactWord => options
                .bindings
                .iter()
                .map(|b| exact_word_pattern(b.name(), options.ignore_case))
                .collect::<Result<Vec<_>>>()?,
        };

        Ok(Self {
            bindings: options.bindings,
            mode: options.mode,
            ignore_case: options.ignore_case,
            concurrency: options.concurrency,
            progress: options.progress,
            patterns,
        })
    }

    /// Applies every binding to `content`.
    ///
    /// Delimited mode makes a single left-to-right pass and inserts values
    /// literally, so a value containing another token is not expanded.
    /// Exact-word mode runs the bindings in declaration order, each over the
    /// output of the previous one; a binding never rescans its own output.
    pub fn replace_text<'r>(&'r self, content: &str) -> Substitution<'r> {
        let mut applied = Vec::new();
        let text = match self.mode {
            MatchMode::Delimited(_) => self.replace_tokens(content, &mut applied),
            MatchMode::ExactWord => self.replace_words(content, &mut applied),
        };
        Substitution { text, applied }
    }

    fn replace_tokens<'r>(&'r self, content: &str, applied: &mut Vec<&'r Binding>) -> String {
        let Some(pattern) = self.patterns.first() else {
            return content.to_string();
        };

        let bindings: &'r Bindings = &self.bindings;
        let ignore_case = self.ignore_case;
        pattern
            .replace_all(content, |caps: &Captures| {
                match bindings.find(&caps[1], ignore_case) {
                    Some(binding) => {
                        applied.push(binding);
                        binding.value().to_string()
                    }
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    fn replace_words<'r>(&'r self, content: &str, applied: &mut Vec<&'r Binding>) -> String {
        let mut text = content.to_string();
        for (binding, pattern) in self.bindings.iter().zip(&self.patterns) {
            text = pattern
                .replace_all(&text, |_: &Captures| {
                    applied.push(binding);
                    binding.value()
                })
                .into_owned();
        }
        text
    }

    /// Rewrites `files` in place and reports whether any of them changed.
    ///
    /// Files are spread over a pool of `concurrency` threads. A file without
    /// any match is neither rewritten nor touched. `on_change` fires once per
    /// replaced occurrence once the file has been written, `on_progress`
    /// receives `(total, processed)` on the configured cadence and once more
    /// after the last file. Both are called from worker threads.
    ///
    /// The first file that fails to be read or written aborts the run with
    /// [`Error::Processing`]; files already rewritten keep their new content
    /// and the final progress call is skipped.
    pub fn substitute<C, P>(
        &self,
        fs: &dyn FileSystem,
        files: &[PathBuf],
        on_change: C,
        on_progress: P,
    ) -> Result<bool>
    where
        C: Fn(ChangeEvent<'_>) + Sync,
        P: Fn(usize, usize) + Sync,
    {
        if files.is_empty() {
            return Ok(false);
        }
        if self.bindings.is_empty() {
            return Err(Error::Configuration(
                "No variable replacements provided.".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let queue: Vec<&PathBuf> = files.iter().filter(|f| seen.insert(*f)).collect();
        if let Some(missing) = queue.iter().find(|f| !fs.is_file(f)) {
            return Err(Error::FileNotFound(missing.to_path_buf()));
        }

        let total = queue.len();
        let processed = AtomicUsize::new(0);
        let rewritten = AtomicUsize::new(0);

        let pool = self.concurrency.thread_pool()?;
        pool.install(|| {
            queue.par_iter().try_for_each(|path| -> Result<()> {
                let changed = self
                    .replace_in_file(fs, path, &on_change)
                    .map_err(|e| e.in_file(path.as_path()))?;
                if changed {
                    rewritten.fetch_add(1, Ordering::Relaxed);
                }

                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                if self.progress.is_due(done) {
                    on_progress(total, done);
                }
                Ok(())
            })
        })?;

        on_progress(total, processed.load(Ordering::Relaxed));

        let rewritten = rewritten.load(Ordering::Relaxed);
        debug!("Rewrote {rewritten} of {total} file(s)");
        Ok(rewritten > 0)
    }

    fn replace_in_file<C>(&self, fs: &dyn FileSystem, path: &Path, on_change: &C) -> Result<bool>
    where
        C: Fn(ChangeEvent<'_>) + Sync,
    {
        let content = fs.read_text(path)?;
        let substitution = self.replace_text(&content);
        if !substitution.changed() {
            trace!("No match in {}", path.display());
            return Ok(false);
        }

        fs.write_text(path, &substitution.text)?;
        for binding in substitution.applied {
            on_change(ChangeEvent { path, binding });
        }
        Ok(true)
    }
}

fn delimited_pattern(delimiters: &Delimiters, ignore_case: bool) -> Result<Regex> {
    let pattern = format!(
        "{}(.*?){}",
        regex::escape(delimiters.start()),
        regex::escape(delimiters.end())
    );
    Ok(RegexBuilder::new(&pattern)
        .case_insensitive(ignore_case)
        .build()?)
}

/// Matches `name` literally as a whole word.
fn exact_word_pattern(name: &str, ignore_case: bool) -> Result<Regex> {
    Ok(RegexBuilder::new(&whole_word(name))
        .case_insensitive(ignore_case)
        .build()?)
}

/// Escapes `name` and adds a `\b` on each side that ends in a word
/// character. A `\b` next to punctuation would demand a word character on
/// the outside, which is never what the caller meant.
fn whole_word(name: &str) -> String {
    let mut pattern = String::new();
    if name.chars().next().is_some_and(is_word_character) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(name));
    if name.chars().last().is_some_and(is_word_character) {
        pattern.push_str(r"\b");
    }
    pattern
}
