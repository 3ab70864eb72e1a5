//! Helpers shared by the logging tests.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use caseflow_core::{VecSource, read_all};
use caseflow_merge::{MatchFiles, MergeInput};
use caseflow_model::{Case, Dictionary, Value, VarKind};
use tracing_subscriber::fmt::MakeWriter;

/// Log sink collecting everything written to it.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Merge one input whose second BY key (7351) is out of order.
pub fn merge_unsorted_input() {
    let dict = Dictionary::from_vars([("K", VarKind::Numeric)]).unwrap();
    let cases = vec![
        Case::new(vec![Value::number(7352.0)]),
        Case::new(vec![Value::number(7351.0)]),
    ];
    let source = VecSource::from_dict(&dict, cases);
    let mut engine = MatchFiles::new()
        .by(&["K"])
        .input(MergeInput::file(dict, source).with_label("visits"))
        .build()
        .unwrap();
    assert_eq!(read_all(&mut engine).unwrap().len(), 2);
}
