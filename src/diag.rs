//! Diagnostics: structured error records with a had-error bit.
//!
//! Semantic problems do not abort compilation; they are reported here and
//! lowering continues with a recovery value so one run surfaces as many
//! errors as possible. The driver consults [`Diagnostics::has_errors`]
//! between phases and refuses to enter the next phase once it is set.

/// The severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
  /// A hard error; code emission is suppressed.
  Error,
}

/// A single diagnostic record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
  /// The severity.
  pub severity: Severity,
  /// 1-based source line, when attributable.
  pub line: Option<u32>,
  /// The rendered message.
  pub message: String,
}

/// An ordered sink of diagnostics. Each record is printed to stderr as it is
/// emitted and retained for inspection.
#[derive(Debug, Default)]
pub struct Diagnostics {
  diags: Vec<Diagnostic>,
}

impl Diagnostics {
  /// Construct an empty sink.
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Report an error with no line attribution.
  pub fn error(&mut self, message: impl Into<String>) {
    self.emit(Diagnostic { severity: Severity::Error, line: None, message: message.into() });
  }

  /// Report an error at a source line.
  pub fn error_at(&mut self, line: u32, message: impl Into<String>) {
    self.emit(Diagnostic { severity: Severity::Error, line: Some(line), message: message.into() });
  }

  fn emit(&mut self, diag: Diagnostic) {
    match diag.line {
      Some(line) => eprintln!("error: {} on line {line}", diag.message),
      None => eprintln!("error: {}", diag.message),
    }
    self.diags.push(diag);
  }

  /// The had-error bit: whether any error has been reported.
  #[must_use] pub fn has_errors(&self) -> bool { !self.diags.is_empty() }

  /// All diagnostics, in emission order.
  #[must_use] pub fn diagnostics(&self) -> &[Diagnostic] { &self.diags }

  /// The phase gate: `Err` with the collected records if any error was
  /// reported.
  pub fn into_result(self) -> Result<(), Vec<Diagnostic>> {
    if self.diags.is_empty() { Ok(()) } else { Err(self.diags) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn errors_set_the_flag_in_order() {
    let mut diags = Diagnostics::new();
    assert!(!diags.has_errors());
    diags.error_at(3, "first");
    diags.error("second");
    assert!(diags.has_errors());
    let recorded = diags.diagnostics();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].line, Some(3));
    assert_eq!(recorded[0].message, "first");
    assert_eq!(recorded[1].line, None);
    assert!(diags.into_result().is_err());
  }
}
