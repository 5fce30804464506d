//! Training-split class balancing via controlled duplication.
//!
//! Balancing never synthesizes new imagery: an under-represented class is
//! topped up by cyclically replaying its existing records with a suffixed
//! synthetic filename. The duplicates become additional label-file
//! entries for the same underlying image content. Classes already at or
//! above the target keep all of their records; there is no downsampling.
//!
//! Whether to balance at all, and to which target, is an operator
//! decision. The pipeline takes it through the [`DecisionSource`] trait
//! so the core never blocks on a terminal; the interactive stdin prompt
//! is one adapter at the CLI boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::record::{AnnotationRecord, LabelColumn, RecordSet};

/// The operator's balancing choice for one pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceDecision {
    /// Keep the natural class distribution.
    KeepNatural,
    /// Duplicate minority-class records up to `target` per class.
    Balance { target: usize },
}

/// Class distribution offered to the decision source.
#[derive(Clone, Debug)]
pub struct ClassDistribution {
    /// Per-class record counts, sorted by class value.
    pub counts: BTreeMap<String, usize>,

    /// Recommended upper bound for the balance target: smallest class
    /// count times the pipeline's cap multiplier. Larger targets imply
    /// aggressive duplication of minority classes and need confirmation.
    pub target_cap: usize,
}

impl ClassDistribution {
    pub fn new(counts: BTreeMap<String, usize>, cap_multiplier: usize) -> Self {
        let smallest = counts.values().copied().min().unwrap_or(0);
        Self {
            counts,
            target_cap: smallest * cap_multiplier,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for ClassDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.total().max(1);
        for (label, count) in &self.counts {
            let percentage = (*count as f64 / total as f64) * 100.0;
            writeln!(f, "  {label:<12}: {count:>5} samples ({percentage:>5.1}%)")?;
        }
        writeln!(f, "  total: {} samples", self.total())
    }
}

/// Supplies the balancing decision for a pipeline run.
pub trait DecisionSource {
    fn choose(&mut self, distribution: &ClassDistribution) -> BalanceDecision;
}

/// Non-interactive decision, e.g. from CLI flags or tests.
///
/// `accept_over_cap` suppresses the over-cap confirmation; without it an
/// over-cap target falls back to the natural distribution.
#[derive(Clone, Copy, Debug)]
pub struct FixedDecision {
    pub decision: BalanceDecision,
    pub accept_over_cap: bool,
}

impl DecisionSource for FixedDecision {
    fn choose(&mut self, distribution: &ClassDistribution) -> BalanceDecision {
        if let BalanceDecision::Balance { target } = self.decision {
            if target > distribution.target_cap && !self.accept_over_cap {
                eprintln!(
                    "Warning: target {} exceeds the recommended cap of {}; \
                     keeping the natural distribution (pass --yes to override)",
                    target, distribution.target_cap
                );
                return BalanceDecision::KeepNatural;
            }
        }
        self.decision
    }
}

/// Interactive stdin prompt.
///
/// Invalid input is never fatal: the prompt loops until it gets a valid
/// choice, and flags targets above the recommended cap before accepting
/// them.
pub struct InteractivePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> InteractivePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        // EOF or a read failure behaves like declining to balance.
        if self.input.read_line(&mut line).is_err() {
            return String::new();
        }
        line.trim().to_string()
    }

    fn prompt(&mut self, message: &str) -> String {
        let _ = write!(self.output, "{message}");
        let _ = self.output.flush();
        self.read_line()
    }
}

impl<R: BufRead, W: Write> DecisionSource for InteractivePrompt<R, W> {
    fn choose(&mut self, distribution: &ClassDistribution) -> BalanceDecision {
        let _ = writeln!(self.output, "Training class distribution:");
        let _ = write!(self.output, "{distribution}");
        let _ = writeln!(self.output, "Balance the training dataset?");
        let _ = writeln!(self.output, "  1. Yes, with a custom target");
        let _ = writeln!(self.output, "  2. No, keep the natural distribution");

        loop {
            match self.prompt("Choice [1/2]: ").as_str() {
                "1" => {
                    if let Some(target) = self.ask_target(distribution) {
                        return BalanceDecision::Balance { target };
                    }
                    // Declined the over-cap confirmation (or hit EOF at
                    // the target prompt); ask again.
                }
                "2" | "" => return BalanceDecision::KeepNatural,
                _ => {
                    let _ = writeln!(self.output, "Please enter 1 or 2");
                }
            }
        }
    }
}

impl<R: BufRead, W: Write> InteractivePrompt<R, W> {
    fn ask_target(&mut self, distribution: &ClassDistribution) -> Option<usize> {
        loop {
            let raw = self.prompt("Target samples per class: ");
            // An empty line means EOF or declining, same as in the outer
            // choice loop; re-prompting would spin forever on closed stdin.
            if raw.is_empty() {
                return None;
            }
            let target = match raw.parse::<usize>() {
                Ok(t) if t > 0 => t,
                _ => {
                    let _ = writeln!(self.output, "Please enter a positive number");
                    continue;
                }
            };

            if target > distribution.target_cap {
                let _ = writeln!(
                    self.output,
                    "Warning: {} exceeds the recommended cap of {} (aggressive duplication)",
                    target, distribution.target_cap
                );
                let confirm = self.prompt(&format!("Continue with {target}? [y/n]: "));
                if !confirm.eq_ignore_ascii_case("y") {
                    return None;
                }
            }

            return Some(target);
        }
    }
}

/// Balances the set so every class of `column` has at least `target`
/// records. Classes at or above the target are untouched; smaller
/// classes are topped up by cyclic duplication.
///
/// The output is grouped by class value in sorted order; within each
/// class the originals come first, in their input order, followed by the
/// duplicates.
pub fn balance(set: &RecordSet, column: LabelColumn, target: usize) -> RecordSet {
    let mut groups: BTreeMap<&str, Vec<&AnnotationRecord>> = BTreeMap::new();
    for record in &set.records {
        if let Some(value) = column.value(record) {
            groups.entry(value).or_default().push(record);
        }
    }

    let mut balanced = Vec::new();
    for group in groups.values() {
        balanced.extend(group.iter().map(|record| (*record).clone()));

        let existing = group.len();
        if existing == 0 || existing >= target {
            continue;
        }

        for ordinal in 0..target - existing {
            let source = group[ordinal % existing];
            let mut duplicate = source.clone();
            duplicate.filename = duplicate_filename(&source.filename, ordinal);
            balanced.push(duplicate);
        }
    }

    RecordSet::new(set.split, balanced)
}

/// Builds the synthetic filename for the `ordinal`-th duplicate produced
/// during one class's duplication run: `<stem>_dup<ordinal><suffix>`.
pub fn duplicate_filename(original: &str, ordinal: usize) -> String {
    let path = Path::new(original);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(original);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_dup{ordinal}.{ext}"),
        None => format!("{stem}_dup{ordinal}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AnnotationRecord, Split};
    use std::io::Cursor;

    fn record(filename: &str, disease: &str) -> AnnotationRecord {
        let mut rec =
            AnnotationRecord::new(filename, "Tomato x", (0.0, 0.0, 5.0, 5.0), 100, 100);
        rec.disease = Some(disease.to_string());
        rec
    }

    fn set_with(counts: &[(&str, usize)]) -> RecordSet {
        let mut records = Vec::new();
        for (disease, count) in counts {
            for i in 0..*count {
                records.push(record(&format!("{disease}_{i}.jpg"), disease));
            }
        }
        RecordSet::new(Split::Train, records)
    }

    #[test]
    fn underrepresented_class_reaches_exact_target() {
        let set = set_with(&[("Blight", 2), ("Rust", 5)]);
        let balanced = balance(&set, LabelColumn::Disease, 5);

        let dist = balanced.distribution(LabelColumn::Disease);
        assert_eq!(dist["Blight"], 5);
        assert_eq!(dist["Rust"], 5);
    }

    #[test]
    fn duplicates_cycle_through_originals() {
        let set = set_with(&[("Blight", 2)]);
        let balanced = balance(&set, LabelColumn::Disease, 5);

        let names: Vec<&str> = balanced.records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Blight_0.jpg",
                "Blight_1.jpg",
                "Blight_0_dup0.jpg",
                "Blight_1_dup1.jpg",
                "Blight_0_dup2.jpg",
            ]
        );
    }

    #[test]
    fn class_at_or_above_target_is_unchanged() {
        let set = set_with(&[("Rust", 4)]);
        let balanced = balance(&set, LabelColumn::Disease, 3);

        assert_eq!(balanced.len(), 4);
        assert!(balanced.records.iter().all(|r| !r.filename.contains("_dup")));
    }

    #[test]
    fn duplicate_filenames_are_distinct() {
        let set = set_with(&[("Blight", 3)]);
        let balanced = balance(&set, LabelColumn::Disease, 10);

        let unique = balanced.unique_filenames();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn duplicate_filename_format() {
        assert_eq!(duplicate_filename("img.jpg", 0), "img_dup0.jpg");
        assert_eq!(duplicate_filename("img.jpg", 12), "img_dup12.jpg");
        assert_eq!(duplicate_filename("noext", 1), "noext_dup1");
    }

    #[test]
    fn distribution_cap_uses_multiplier() {
        let set = set_with(&[("Blight", 3), ("Rust", 9)]);
        let dist = ClassDistribution::new(set.distribution(LabelColumn::Disease), 2);
        assert_eq!(dist.target_cap, 6);
    }

    #[test]
    fn fixed_decision_over_cap_without_override_keeps_natural() {
        let dist = ClassDistribution::new(
            [("a".to_string(), 2), ("b".to_string(), 8)].into_iter().collect(),
            1,
        );
        let mut source = FixedDecision {
            decision: BalanceDecision::Balance { target: 100 },
            accept_over_cap: false,
        };
        assert_eq!(source.choose(&dist), BalanceDecision::KeepNatural);

        source.accept_over_cap = true;
        assert_eq!(source.choose(&dist), BalanceDecision::Balance { target: 100 });
    }

    #[test]
    fn interactive_prompt_reprompts_on_invalid_input() {
        let dist = ClassDistribution::new(
            [("a".to_string(), 4), ("b".to_string(), 8)].into_iter().collect(),
            1,
        );

        let input = Cursor::new("7\n1\nzero\n3\n");
        let mut prompt = InteractivePrompt::new(input, Vec::new());
        let decision = prompt.choose(&dist);

        assert_eq!(decision, BalanceDecision::Balance { target: 3 });
    }

    #[test]
    fn interactive_prompt_eof_after_choice_keeps_natural() {
        let dist = ClassDistribution::new(
            [("a".to_string(), 4), ("b".to_string(), 8)].into_iter().collect(),
            1,
        );

        // Input ends right after selecting "balance": the target prompt
        // sees EOF and the dialogue falls back to the natural
        // distribution instead of re-prompting forever.
        let input = Cursor::new("1\n");
        let mut prompt = InteractivePrompt::new(input, Vec::new());
        assert_eq!(prompt.choose(&dist), BalanceDecision::KeepNatural);
    }

    #[test]
    fn interactive_prompt_over_cap_needs_confirmation() {
        let dist = ClassDistribution::new(
            [("a".to_string(), 4), ("b".to_string(), 8)].into_iter().collect(),
            1,
        );

        // Over-cap target declined, then the operator keeps natural.
        let input = Cursor::new("1\n50\nn\n2\n");
        let mut prompt = InteractivePrompt::new(input, Vec::new());
        assert_eq!(prompt.choose(&dist), BalanceDecision::KeepNatural);

        // Over-cap target confirmed.
        let input = Cursor::new("1\n50\ny\n");
        let mut prompt = InteractivePrompt::new(input, Vec::new());
        assert_eq!(prompt.choose(&dist), BalanceDecision::Balance { target: 50 });
    }
}
