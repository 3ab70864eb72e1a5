//! End-to-end procedure runs over a dataset.

use std::io;

use anyhow::Result;
use caseflow_core::{
    CaseSource, Dataset, FnTransform, GroupHandler, PipelineError, PipelineOptions, SelectIf,
    StoreKind, TransformContext, VecSink, VecSource, Verdict, group_cases,
};
use caseflow_model::{Case, CaseProto, Dictionary, SYSMIS, Value, VarKind};

fn numeric_dataset(name: &str, values: &[f64]) -> Dataset {
    let dict = Dictionary::from_vars([(name, VarKind::Numeric)]).unwrap();
    let cases = values
        .iter()
        .map(|&x| Case::new(vec![Value::number(x)]))
        .collect();
    Dataset::new(dict.clone(), VecSource::from_dict(&dict, cases))
}

fn column(cases: &[Case], position: usize) -> Vec<f64> {
    cases
        .iter()
        .map(|c| c.number(position).unwrap_or(f64::NAN))
        .collect()
}

fn add_to_first(amount: f64) -> FnTransform<impl FnMut(&mut Case, &TransformContext<'_>) -> Verdict> {
    FnTransform::new("COMPUTE", move |case: &mut Case, _: &TransformContext<'_>| {
        let x = case.number(0).unwrap_or(SYSMIS);
        match case.set(0, Value::number(x + amount)) {
            Ok(()) => Verdict::Continue,
            Err(_) => Verdict::Error,
        }
    })
}

#[test]
fn select_if_drops_matching_cases_before_the_sink() -> Result<()> {
    let values: Vec<f64> = (1..=10).map(f64::from).collect();
    let mut dataset = numeric_dataset("X", &values);
    dataset.add_transformation(SelectIf::new(|case: &Case| {
        case.number(0).is_some_and(|x| x % 3.0 != 0.0)
    }))?;

    let mut sink = VecSink::new();
    let mut run = dataset.open_procedure()?;
    run.add_output(&mut sink);
    let summary = run.commit()?;

    assert_eq!(sink.cases().len(), 7);
    assert!(sink.is_finished());
    assert_eq!(summary.read, 10);
    assert_eq!(summary.dropped, 3);
    assert_eq!(summary.written, 7);

    // The replacement active file holds the surviving cases.
    let again = dataset.collect_cases()?;
    assert_eq!(column(&again, 0), vec![1.0, 2.0, 4.0, 5.0, 7.0, 8.0, 10.0]);
    Ok(())
}

#[test]
fn permanent_transformations_apply_once() -> Result<()> {
    let mut dataset = numeric_dataset("X", &[1.0, 2.0]);
    dataset.add_transformation(add_to_first(10.0))?;
    assert_eq!(column(&dataset.collect_cases()?, 0), vec![11.0, 12.0]);
    assert!(dataset.transforms().is_empty());
    assert_eq!(column(&dataset.collect_cases()?, 0), vec![11.0, 12.0]);
    Ok(())
}

#[test]
fn temporary_changes_last_one_procedure() -> Result<()> {
    let mut dataset = numeric_dataset("X", &[1.0, 2.0, 3.0, 4.0]);
    dataset.add_transformation(add_to_first(1.0))?;

    dataset.start_temporary();
    dataset.dict_mut().add_var("Y", VarKind::Numeric)?;
    dataset.add_transformation(FnTransform::new(
        "COMPUTE Y",
        |case: &mut Case, _: &TransformContext<'_>| {
            let x = case.number(0).unwrap_or(SYSMIS);
            match case.set(1, Value::number(x * 2.0)) {
                Ok(()) => Verdict::Continue,
                Err(_) => Verdict::Error,
            }
        },
    ))?;
    dataset.add_transformation(SelectIf::new(|case: &Case| case.number(0) > Some(2.0)))?;

    let mut run = dataset.open_procedure()?;
    assert_eq!(run.dictionary().len(), 2);
    assert_eq!(run.proto(), &CaseProto::new(vec![0, 0]));
    let mut seen = Vec::new();
    while let Some(case) = run.read()? {
        seen.push(case);
    }
    let summary = run.commit()?;
    assert_eq!(column(&seen, 0), vec![3.0, 4.0, 5.0]);
    assert_eq!(column(&seen, 1), vec![6.0, 8.0, 10.0]);
    assert_eq!(summary.written, 4);
    assert_eq!(summary.dropped, 1);

    assert!(!dataset.is_temporary());
    assert_eq!(dataset.dict().len(), 1);
    assert_eq!(column(&dataset.collect_cases()?, 0), vec![2.0, 3.0, 4.0, 5.0]);
    Ok(())
}

#[test]
fn cancel_temporary_restores_dictionary() -> Result<()> {
    let mut dataset = numeric_dataset("X", &[1.0]);
    dataset.start_temporary();
    dataset.dict_mut().rename_var("X", "Z")?;
    dataset.add_transformation(add_to_first(5.0))?;
    dataset.cancel_temporary();

    assert_eq!(dataset.dict().var(0).map(|v| v.name()), Some("X"));
    assert_eq!(column(&dataset.collect_cases()?, 0), vec![1.0]);
    Ok(())
}

#[test]
fn leave_variables_carry_across_cases() -> Result<()> {
    let mut dataset = numeric_dataset("X", &[1.0, 2.0, 3.0, 4.0]);
    dataset.dict_mut().add_var("TOTAL", VarKind::Numeric)?;
    dataset.dict_mut().add_var("SCRATCH", VarKind::String(4))?;
    dataset.dict_mut().set_leave("TOTAL", true)?;
    dataset.add_transformation(FnTransform::new(
        "COMPUTE TOTAL",
        |case: &mut Case, _: &TransformContext<'_>| {
            let total = case.number(1).unwrap_or(0.0) + case.number(0).unwrap_or(0.0);
            match case.set(1, Value::number(total)) {
                Ok(()) => Verdict::Continue,
                Err(_) => Verdict::Error,
            }
        },
    ))?;

    let cases = dataset.collect_cases()?;
    assert_eq!(column(&cases, 1), vec![1.0, 3.0, 6.0, 10.0]);
    assert_eq!(cases[0][2], Value::missing(4));
    Ok(())
}

#[test]
fn lag_sees_previous_permanent_case() -> Result<()> {
    let mut dataset = numeric_dataset("X", &[1.0, 2.0, 3.0]);
    dataset.dict_mut().add_var("PREV", VarKind::Numeric)?;
    dataset.add_transformation(
        FnTransform::new("LAG", |case: &mut Case, ctx: &TransformContext<'_>| {
            let prev = ctx.lagged(1).and_then(|c| c.number(0)).unwrap_or(SYSMIS);
            match case.set(1, Value::number(prev)) {
                Ok(()) => Verdict::Continue,
                Err(_) => Verdict::Error,
            }
        })
        .with_lag(1),
    )?;

    let cases = dataset.collect_cases()?;
    assert!(cases[0][1].is_sysmis());
    assert_eq!(cases[1].number(1), Some(1.0));
    assert_eq!(cases[2].number(1), Some(2.0));
    Ok(())
}

#[test]
fn filter_excludes_zero_and_missing() -> Result<()> {
    let mut dataset = numeric_dataset("F", &[1.0, 0.0, SYSMIS, 2.0]);
    dataset.dict_mut().set_filter_var(Some("F"))?;

    let mut run = dataset.open_procedure()?;
    let mut kept = 0;
    while run.read()?.is_some() {
        kept += 1;
    }
    let summary = run.commit()?;
    assert_eq!(kept, 2);
    assert_eq!(summary.filtered, 2);
    assert_eq!(summary.written, 4);
    Ok(())
}

#[test]
fn case_limit_truncates_input() -> Result<()> {
    let values: Vec<f64> = (1..=10).map(f64::from).collect();
    let mut dataset = numeric_dataset("X", &values)
        .with_options(PipelineOptions::new().with_case_limit(Some(3)));
    let cases = dataset.collect_cases()?;
    assert_eq!(column(&cases, 0), vec![1.0, 2.0, 3.0]);
    Ok(())
}

#[test]
fn disk_backed_replacement_round_trips() -> Result<()> {
    let dict = Dictionary::from_vars([("ID", VarKind::Numeric), ("NAME", VarKind::String(5))])?;
    let cases: Vec<Case> = ["ann", "bob", "cy"]
        .iter()
        .enumerate()
        .map(|(i, name)| Case::new(vec![Value::number(i as f64), Value::string(name, 5)]))
        .collect();
    let temp = tempfile::tempdir()?;
    let options = PipelineOptions::new()
        .with_store(StoreKind::Disk)
        .with_temp_dir(temp.path());
    let mut dataset =
        Dataset::new(dict.clone(), VecSource::from_dict(&dict, cases.clone())).with_options(options);

    assert_eq!(dataset.collect_cases()?, cases);
    assert_eq!(dataset.collect_cases()?, cases);
    Ok(())
}

#[test]
fn temporary_lag_uses_the_temporary_layout() -> Result<()> {
    let dict = Dictionary::from_vars([("A", VarKind::Numeric), ("B", VarKind::Numeric)])?;
    let cases = vec![
        Case::new(vec![Value::number(1.0), Value::number(100.0)]),
        Case::new(vec![Value::number(2.0), Value::number(200.0)]),
    ];
    let mut dataset = Dataset::new(dict.clone(), VecSource::from_dict(&dict, cases));

    dataset.start_temporary();
    dataset.dict_mut().keep_vars(&["B"])?;
    dataset.dict_mut().add_var("PREVB", VarKind::Numeric)?;
    dataset.add_transformation(
        FnTransform::new("LAG B", |case: &mut Case, ctx: &TransformContext<'_>| {
            let prev = ctx.lagged(1).and_then(|c| c.number(0)).unwrap_or(SYSMIS);
            match case.set(1, Value::number(prev)) {
                Ok(()) => Verdict::Continue,
                Err(_) => Verdict::Error,
            }
        })
        .with_lag(1),
    )?;

    let seen = dataset.collect_cases()?;
    assert_eq!(column(&seen, 0), vec![100.0, 200.0]);
    assert!(seen[0][1].is_sysmis());
    assert_eq!(seen[1].number(1), Some(100.0));
    Ok(())
}

#[test]
fn transformation_error_aborts_run() {
    let mut dataset = numeric_dataset("X", &[1.0, 2.0, 3.0]);
    dataset
        .add_transformation(FnTransform::new(
            "CHECK",
            |case: &mut Case, _: &TransformContext<'_>| {
                if case.number(0) == Some(2.0) {
                    Verdict::Error
                } else {
                    Verdict::Continue
                }
            },
        ))
        .unwrap();

    let mut run = dataset.open_procedure().unwrap();
    assert!(run.read().unwrap().is_some());
    let err = run.read().unwrap_err();
    assert!(matches!(
        err,
        PipelineError::TransformFailed { case_number: 2, ref name, .. } if name == "CHECK"
    ));
    assert!(matches!(run.read(), Err(PipelineError::RunAborted)));
    assert!(matches!(
        run.commit(),
        Err(PipelineError::TransformFailed { case_number: 2, .. })
    ));

    // The case written before the failure becomes the active file.
    assert_eq!(column(&dataset.collect_cases().unwrap(), 0), vec![1.0]);
}

struct FailingSource {
    proto: CaseProto,
    remaining: u32,
}

impl CaseSource for FailingSource {
    fn proto(&self) -> &CaseProto {
        &self.proto
    }

    fn read(&mut self) -> caseflow_core::Result<Option<Case>> {
        if self.remaining == 0 {
            return Err(io::Error::other("device went away").into());
        }
        self.remaining -= 1;
        Ok(Some(Case::new(vec![Value::number(f64::from(self.remaining))])))
    }
}

#[test]
fn source_io_error_propagates() {
    let dict = Dictionary::from_vars([("X", VarKind::Numeric)]).unwrap();
    let source = FailingSource {
        proto: dict.proto(),
        remaining: 2,
    };
    let mut dataset = Dataset::new(dict, source);

    let err = dataset.collect_cases().unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
    assert_eq!(dataset.collect_cases().unwrap().len(), 2);
}

#[test]
fn commit_after_failed_read_reports_the_read_error() {
    let dict = Dictionary::from_vars([("X", VarKind::Numeric)]).unwrap();
    let source = FailingSource {
        proto: dict.proto(),
        remaining: 0,
    };
    let mut dataset = Dataset::new(dict, source);

    let mut run = dataset.open_procedure().unwrap();
    assert!(matches!(run.read(), Err(PipelineError::Io(_))));
    let err = run.commit().unwrap_err();
    assert!(matches!(err, PipelineError::Io(ref io) if io.to_string() == "device went away"));
    assert!(dataset.collect_cases().unwrap().is_empty());
}

#[test]
fn mismatched_source_case_is_rejected() {
    let dict = Dictionary::from_vars([("X", VarKind::Numeric)]).unwrap();
    let bad = VecSource::new(
        dict.proto(),
        vec![Case::new(vec![Value::string("oops", 4)])],
    );
    let mut dataset = Dataset::new(dict, bad);
    assert!(matches!(
        dataset.collect_cases(),
        Err(PipelineError::Model(_))
    ));
}

#[derive(Default)]
struct GroupSizes {
    sizes: Vec<usize>,
}

impl GroupHandler for GroupSizes {
    fn begin(&mut self, _first: &Case) -> caseflow_core::Result<()> {
        self.sizes.push(0);
        Ok(())
    }

    fn process(&mut self, _case: &Case) -> caseflow_core::Result<()> {
        if let Some(last) = self.sizes.last_mut() {
            *last += 1;
        }
        Ok(())
    }

    fn end(&mut self) -> caseflow_core::Result<()> {
        Ok(())
    }
}

#[test]
fn split_groups_over_a_procedure() -> Result<()> {
    let mut dataset = numeric_dataset("G", &[1.0, 1.0, 2.0, 3.0, 3.0, 3.0]);
    dataset.dict_mut().set_split_vars(&["G"])?;

    let mut run = dataset.open_procedure()?;
    let keys = run.split_keys();
    let mut handler = GroupSizes::default();
    let stats = group_cases(&mut run, &keys, &mut handler)?;
    run.commit()?;

    assert_eq!(stats.groups, 3);
    assert_eq!(stats.cases, 6);
    assert_eq!(handler.sizes, vec![2, 1, 3]);
    Ok(())
}

#[test]
fn dropped_run_still_passes_every_case_through() {
    let mut dataset = numeric_dataset("X", &[1.0]);
    let run = dataset.open_procedure().unwrap();
    drop(run);
    assert!(dataset.has_active_file());
    assert_eq!(dataset.collect_cases().unwrap().len(), 1);
}
