//! Interactive console: one prediction per input line until end of input.

use std::io::{self, BufRead, Write};

use crate::ml::Prediction;
use crate::predictor::Predictor;

pub const PROMPT: &str = "Enter a text to classify:";

/// Lazy iterator over input lines with the line terminator removed.
///
/// Invalid UTF-8 is replaced rather than rejected. Ends at end-of-stream;
/// read errors are yielded once and end iteration.
pub struct InputLines<R> {
    reader: R,
    buf: Vec<u8>,
    failed: bool,
}

impl<R: BufRead> Iterator for InputLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let line = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf[..]);
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                Some(Ok(String::from_utf8_lossy(line).into_owned()))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

pub fn input_lines<R: BufRead>(reader: R) -> InputLines<R> {
    InputLines {
        reader,
        buf: Vec::new(),
        failed: false,
    }
}

/// Human-readable result line; the bracketed tag carries the label.
pub fn format_prediction(prediction: &Prediction) -> String {
    if prediction.label {
        format!(
            "[TOXIC] Toxic sentiment. Probability of being toxic: {:.4}",
            prediction.probability
        )
    } else {
        format!(
            "[OK] Non toxic sentiment. Probability of being toxic: {:.4}",
            prediction.probability
        )
    }
}

/// Exit with status 0 on Ctrl-C, the same as end of input.
///
/// Does not touch stdout: [`run_console`] holds its lock while blocked on
/// input and flushes after every prediction.
pub fn install_interrupt_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        tracing::info!("Interrupted; exiting");
        std::process::exit(0);
    })
}

/// Serve predictions for every line of `input`, returning how many were made.
pub fn run_console<R: BufRead, W: Write>(
    predictor: &Predictor,
    input: R,
    output: &mut W,
) -> io::Result<usize> {
    let mut served = 0usize;
    writeln!(output, "\n{PROMPT}")?;
    output.flush()?;
    for line in input_lines(input) {
        let text = line?;
        let prediction = predictor.predict(&text);
        tracing::debug!(
            "Predicted label={} probability={:.4} for {} chars",
            prediction.label,
            prediction.probability,
            text.chars().count()
        );
        writeln!(output, "\n{}\n", format_prediction(&prediction))?;
        writeln!(output, "{PROMPT}")?;
        output.flush()?;
        served += 1;
    }
    Ok(served)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Dataset, Example};
    use crate::ml::{DEFAULT_THRESHOLD, FeatureOptions, ToxicityModel, TrainOptions};
    use std::io::{BufReader, Cursor, Read};

    fn predictor() -> Predictor {
        let rows: Dataset = (0..20)
            .flat_map(|_| {
                [
                    Example::new(false, "This is great"),
                    Example::new(true, "You are an idiot"),
                ]
            })
            .collect();
        Predictor::new(
            ToxicityModel::fit(
                &rows,
                &FeatureOptions::default(),
                &TrainOptions::default(),
                DEFAULT_THRESHOLD,
            )
            .unwrap(),
        )
    }

    #[test]
    fn input_lines_strip_terminators() {
        let lines: Vec<String> = input_lines(Cursor::new("one\r\ntwo\n\nlast"))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["one", "two", "", "last"]);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let predictor = predictor();
        let mut out = Vec::new();
        let served = run_console(
            &predictor,
            Cursor::new(b"caf\xe9 idiot\nThis is great\n".to_vec()),
            &mut out,
        )
        .unwrap();
        assert_eq!(served, 2);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().filter(|line| line.starts_with('[')).count(), 2);

        let lines: Vec<String> = input_lines(Cursor::new(b"caf\xe9\r\n".to_vec()))
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["caf\u{FFFD}"]);
    }

    #[test]
    fn input_lines_end_on_empty_stream() {
        assert!(input_lines(Cursor::new("")).next().is_none());
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("broken pipe"))
        }
    }

    #[test]
    fn input_lines_stop_after_error() {
        let mut lines = input_lines(BufReader::new(FailingReader));
        assert!(matches!(lines.next(), Some(Err(_))));
        assert!(lines.next().is_none());
    }

    #[test]
    fn one_prediction_per_line_until_eof() {
        let predictor = predictor();
        let mut out = Vec::new();
        let served = run_console(
            &predictor,
            Cursor::new("You are an idiot\nThis is great\n\n"),
            &mut out,
        )
        .unwrap();
        assert_eq!(served, 3);

        let text = String::from_utf8(out).unwrap();
        let results: Vec<&str> = text
            .lines()
            .filter(|line| line.starts_with('['))
            .collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].starts_with("[TOXIC]"));
        assert!(results[1].starts_with("[OK]"));
        assert_eq!(text.matches(PROMPT).count(), 4);
    }

    #[test]
    fn interrupt_handler_installs_once() {
        install_interrupt_handler().unwrap();
        assert!(matches!(
            install_interrupt_handler(),
            Err(ctrlc::Error::MultipleHandlers)
        ));
    }

    #[test]
    fn format_shows_probability() {
        let line = format_prediction(&Prediction {
            label: false,
            probability: 0.01234,
            score: -4.38,
        });
        assert_eq!(
            line,
            "[OK] Non toxic sentiment. Probability of being toxic: 0.0123"
        );
    }
}
