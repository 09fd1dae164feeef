//! Filter Graph
//!
//! Typed representation of an FFmpeg `filter_complex` graph. Statements are appended
//! through `FilterGraphBuilder`, which enforces the label invariants as the graph grows:
//! every input is an attached engine input or a label produced earlier and not yet
//! consumed, labels are unique, every label is consumed exactly once, and the single
//! unlabeled (terminal) statement comes last.

mod compiler;

pub use compiler::{
    escape_filter_path, GraphCompiler, PlannedOverlay, SubtitleTrack, VisibilityWindow,
};

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

// =============================================================================
// Errors
// =============================================================================

/// Graph construction failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Nothing to compose: no overlays")]
    NothingToCompose,

    #[error("Input {index} is not attached (engine has {input_count} inputs)")]
    UnattachedInput { index: usize, input_count: usize },

    #[error("Label [{0}] is not produced by any earlier statement or was already consumed")]
    UndefinedLabel(String),

    #[error("Label [{0}] is produced twice")]
    DuplicateLabel(String),

    #[error("Label [{0}] is never consumed")]
    DanglingLabel(String),

    #[error("Graph has no terminal statement")]
    MissingTerminal,

    #[error("Statement added after the terminal statement")]
    TerminalNotLast,
}

// =============================================================================
// Statements
// =============================================================================

/// A pad feeding a statement
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum Pad {
    /// Video stream of engine input N (`[N:v]`)
    Input(usize),
    /// Output of an earlier statement
    Label(String),
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pad::Input(index) => write!(f, "[{index}:v]"),
            Pad::Label(label) => write!(f, "[{label}]"),
        }
    }
}

/// `[in1][in2]operation[out1][out2]`; no output label means terminal
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStatement {
    pub inputs: Vec<Pad>,
    pub operation: String,
    pub outputs: Vec<String>,
}

impl FilterStatement {
    pub fn is_terminal(&self) -> bool {
        self.outputs.is_empty()
    }
}

impl fmt::Display for FilterStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pad in &self.inputs {
            write!(f, "{pad}")?;
        }
        write!(f, "{}", self.operation)?;
        for output in &self.outputs {
            write!(f, "[{output}]")?;
        }
        Ok(())
    }
}

/// A validated graph; `Display` yields the `filter_complex` argument
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilterGraph {
    statements: Vec<FilterStatement>,
}

impl FilterGraph {
    pub fn statements(&self) -> &[FilterStatement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Produced labels, in statement order
    pub fn labels(&self) -> Vec<&str> {
        self.statements
            .iter()
            .flat_map(|s| s.outputs.iter().map(String::as_str))
            .collect()
    }

    pub fn terminal(&self) -> Option<&FilterStatement> {
        self.statements.last().filter(|s| s.is_terminal())
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, statement) in self.statements.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{statement}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Appends statements while checking the label invariants
#[derive(Debug)]
pub struct FilterGraphBuilder {
    input_count: usize,
    statements: Vec<FilterStatement>,
    produced: BTreeSet<String>,
    pending: BTreeSet<String>,
    terminated: bool,
}

impl FilterGraphBuilder {
    pub fn new(input_count: usize) -> Self {
        Self {
            input_count,
            statements: Vec::new(),
            produced: BTreeSet::new(),
            pending: BTreeSet::new(),
            terminated: false,
        }
    }

    /// Pad for an attached engine input
    pub fn input(&self, index: usize) -> Result<Pad, CompileError> {
        if index < self.input_count {
            Ok(Pad::Input(index))
        } else {
            Err(CompileError::UnattachedInput {
                index,
                input_count: self.input_count,
            })
        }
    }

    /// Appends a labeled statement and returns the pad for its output
    pub fn push(
        &mut self,
        inputs: Vec<Pad>,
        operation: impl Into<String>,
        output: impl Into<String>,
    ) -> Result<Pad, CompileError> {
        let output = output.into();
        self.push_many(inputs, operation, vec![output.clone()])?;
        Ok(Pad::Label(output))
    }

    /// Appends a statement with several labeled outputs (`scale2ref`, `split`)
    ///
    /// Returns one pad per output, in order.
    pub fn push_many(
        &mut self,
        inputs: Vec<Pad>,
        operation: impl Into<String>,
        outputs: Vec<String>,
    ) -> Result<Vec<Pad>, CompileError> {
        if self.terminated {
            return Err(CompileError::TerminalNotLast);
        }
        let mut fresh = BTreeSet::new();
        for output in &outputs {
            if self.produced.contains(output) || !fresh.insert(output.as_str()) {
                return Err(CompileError::DuplicateLabel(output.clone()));
            }
        }
        self.consume(&inputs)?;

        for output in &outputs {
            self.produced.insert(output.clone());
            self.pending.insert(output.clone());
        }
        let pads = outputs.iter().cloned().map(Pad::Label).collect();
        self.statements.push(FilterStatement {
            inputs,
            operation: operation.into(),
            outputs,
        });
        Ok(pads)
    }

    /// Appends the unlabeled statement that feeds the encoder
    pub fn push_terminal(
        &mut self,
        inputs: Vec<Pad>,
        operation: impl Into<String>,
    ) -> Result<(), CompileError> {
        if self.terminated {
            return Err(CompileError::TerminalNotLast);
        }
        self.consume(&inputs)?;
        self.terminated = true;
        self.statements.push(FilterStatement {
            inputs,
            operation: operation.into(),
            outputs: Vec::new(),
        });
        Ok(())
    }

    pub fn finish(self) -> Result<FilterGraph, CompileError> {
        if !self.terminated {
            return Err(CompileError::MissingTerminal);
        }
        if let Some(dangling) = self.pending.into_iter().next() {
            return Err(CompileError::DanglingLabel(dangling));
        }
        Ok(FilterGraph {
            statements: self.statements,
        })
    }

    fn consume(&mut self, inputs: &[Pad]) -> Result<(), CompileError> {
        for pad in inputs {
            match pad {
                Pad::Input(index) => {
                    self.input(*index)?;
                }
                Pad::Label(label) => {
                    if !self.pending.remove(label) {
                        return Err(CompileError::UndefinedLabel(label.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_chain() {
        let mut builder = FilterGraphBuilder::new(2);
        let base = builder.input(0).unwrap();
        let overlay = builder.input(1).unwrap();
        let scaled = builder
            .push(vec![overlay], "scale=-2:324", "scaled0")
            .unwrap();
        builder
            .push_terminal(vec![base, scaled], "overlay=10:10")
            .unwrap();

        let graph = builder.finish().unwrap();
        assert_eq!(
            graph.to_string(),
            "[1:v]scale=-2:324[scaled0];[0:v][scaled0]overlay=10:10"
        );
        assert_eq!(graph.labels(), vec!["scaled0"]);
        assert!(graph.terminal().is_some());
    }

    #[test]
    fn test_rejects_unattached_input() {
        let builder = FilterGraphBuilder::new(2);
        assert_eq!(
            builder.input(2),
            Err(CompileError::UnattachedInput {
                index: 2,
                input_count: 2
            })
        );
    }

    #[test]
    fn test_rejects_undefined_and_reused_labels() {
        let mut builder = FilterGraphBuilder::new(1);
        let err = builder
            .push(vec![Pad::Label("ghost".into())], "null", "out")
            .unwrap_err();
        assert_eq!(err, CompileError::UndefinedLabel("ghost".into()));

        let a = builder.push(vec![Pad::Input(0)], "null", "a").unwrap();
        builder.push(vec![a.clone()], "null", "b").unwrap();
        assert_eq!(
            builder.push(vec![a], "null", "c").unwrap_err(),
            CompileError::UndefinedLabel("a".into())
        );
    }

    #[test]
    fn test_rejects_duplicate_label() {
        let mut builder = FilterGraphBuilder::new(1);
        builder.push(vec![Pad::Input(0)], "null", "a").unwrap();
        assert_eq!(
            builder.push(vec![Pad::Input(0)], "null", "a").unwrap_err(),
            CompileError::DuplicateLabel("a".into())
        );
    }

    #[test]
    fn test_finish_checks_terminal_and_dangling() {
        let mut builder = FilterGraphBuilder::new(1);
        builder.push(vec![Pad::Input(0)], "null", "a").unwrap();
        assert_eq!(builder.finish().unwrap_err(), CompileError::MissingTerminal);

        let mut builder = FilterGraphBuilder::new(1);
        builder.push(vec![Pad::Input(0)], "null", "a").unwrap();
        builder.push_terminal(vec![Pad::Input(0)], "null").unwrap();
        assert_eq!(
            builder.finish().unwrap_err(),
            CompileError::DanglingLabel("a".into())
        );
    }

    #[test]
    fn test_two_output_statement() {
        let mut builder = FilterGraphBuilder::new(2);
        let pads = builder
            .push_many(
                vec![Pad::Input(1), Pad::Input(0)],
                "scale2ref=w=-2:h=ih",
                vec!["scaled0".into(), "ref0".into()],
            )
            .unwrap();
        assert_eq!(pads.len(), 2);
        builder
            .push_terminal(vec![pads[1].clone(), pads[0].clone()], "overlay=0:0")
            .unwrap();

        let graph = builder.finish().unwrap();
        assert_eq!(
            graph.to_string(),
            "[1:v][0:v]scale2ref=w=-2:h=ih[scaled0][ref0];[ref0][scaled0]overlay=0:0"
        );
        assert_eq!(graph.labels(), vec!["scaled0", "ref0"]);
    }

    #[test]
    fn test_repeated_output_in_one_statement() {
        let mut builder = FilterGraphBuilder::new(1);
        assert_eq!(
            builder
                .push_many(vec![Pad::Input(0)], "split", vec!["a".into(), "a".into()])
                .unwrap_err(),
            CompileError::DuplicateLabel("a".into())
        );
    }

    #[test]
    fn test_terminal_must_be_last() {
        let mut builder = FilterGraphBuilder::new(1);
        builder.push_terminal(vec![Pad::Input(0)], "null").unwrap();
        assert_eq!(
            builder.push(vec![Pad::Input(0)], "null", "late").unwrap_err(),
            CompileError::TerminalNotLast
        );
    }
}
