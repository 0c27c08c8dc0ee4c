mod common;

use approx::assert_relative_eq;
use common::{DecayBackend, RecordingRenderer, DECAY, FAST_DECAY};
use sedflow_experiment::{
    EntityKind, ExperimentConfig, ExperimentError, ModelSpec, MultipleModelParameterScan,
    MultipleModelTimeCourse, ParameterTable, SimulationSpec, SingleModelParameterScan,
    SingleModelTimeCourse,
};

fn scan() -> ParameterTable {
    ParameterTable::single("k1", vec![0.1, 0.5, 1.0]).unwrap()
}

#[test]
fn single_model_time_course_declares_everything() {
    let mut backend = DecayBackend::new();
    let exp = SingleModelTimeCourse::new(ModelSpec::new(DECAY))
        .with_title("Decay")
        .build(ExperimentConfig::default().with_project_id("decay"), &mut backend)
        .unwrap();

    let registry = exp.registry();
    assert!(registry.model("decay_model").is_some());
    assert!(registry.simulation("decay_sim").is_some());
    assert_eq!(registry.task("decay_task").unwrap().model_id, "decay_model");

    let report = registry.report("0").unwrap();
    assert_eq!(report.variables, vec!["time", "S1", "S2"]);
    assert_eq!(report.title.as_deref(), Some("Decay"));
    let plot = registry.plot("0").unwrap();
    assert_eq!(plot.x, "time");
    assert_eq!(plot.y, vec!["S1", "S2"]);

    let execution = exp.execute(&mut backend).unwrap();
    assert_eq!(execution.table.num_rows(), 11);
    assert!(execution.warnings.is_empty());
}

#[test]
fn single_model_time_course_without_plot() {
    let mut backend = DecayBackend::new();
    let exp = SingleModelTimeCourse::new(ModelSpec::new(DECAY))
        .without_plot()
        .build(ExperimentConfig::default(), &mut backend)
        .unwrap();
    assert_eq!(exp.registry().plots().count(), 0);
    assert_eq!(exp.registry().reports().count(), 1);
}

#[test]
fn multiple_model_time_course_shares_time_and_labels_by_model() {
    let mut backend = DecayBackend::new();
    let exp = MultipleModelTimeCourse::new(vec![ModelSpec::new(DECAY), ModelSpec::new(FAST_DECAY)])
        .with_simulation(SimulationSpec::uniform(0.0, 10.0).with_num_step(20))
        .build(ExperimentConfig::default(), &mut backend)
        .unwrap();

    let registry = exp.registry();
    assert_eq!(registry.ids(EntityKind::Task), vec!["tmodel0", "tmodel1"]);
    assert_eq!(
        registry.report("mmtc_report1").unwrap().variables,
        vec![
            "tmodel0.time",
            "tmodel0.S1",
            "tmodel1.S1",
            "tmodel0.S2",
            "tmodel1.S2"
        ]
    );

    let table = exp.run_report(&mut backend, "mmtc_report1").unwrap();
    assert_eq!(table.num_rows(), 21);
    assert_eq!(table.columns()[1], "tmodel0.S1");

    let mut renderer = RecordingRenderer::default();
    let frame = exp
        .render_plot(&mut backend, "mmtc_plot1_S1", &mut renderer)
        .unwrap();
    assert_eq!(frame.title.as_deref(), Some("S1"));
    assert_eq!(frame.x_label, "time");
    assert_eq!(frame.y_labels, vec!["model0", "model1"]);

    let frames = exp.render_plots(&mut backend, &mut renderer).unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(renderer.frames.len(), 3);
}

#[test]
fn multiple_model_templates_need_models() {
    let mut backend = DecayBackend::new();
    let err = MultipleModelTimeCourse::new(vec![])
        .build(ExperimentConfig::default(), &mut backend)
        .unwrap_err();
    assert!(matches!(err, ExperimentError::EmptyExperiment(_)));

    let err = MultipleModelParameterScan::new(vec![], scan())
        .build(ExperimentConfig::default(), &mut backend)
        .unwrap_err();
    assert!(matches!(err, ExperimentError::EmptyExperiment(_)));
}

#[test]
fn single_model_scan_sweeps_parameter_on_x_axis() {
    let mut backend = DecayBackend::new();
    let exp = SingleModelParameterScan::new(ModelSpec::new(DECAY), scan())
        .build(ExperimentConfig::default().with_project_id("decay"), &mut backend)
        .unwrap();

    let registry = exp.registry();
    assert!(registry.model("m_decay").is_some());
    assert!(registry.repeated_task("rt_decay").is_some());
    let report = registry.report("r_decay").unwrap();
    assert_eq!(
        report.variables,
        vec!["rt_decay.k1", "rt_decay.S1", "rt_decay.S2"]
    );
    assert_eq!(report.title.as_deref(), Some("Parameter scan for m_decay"));
    let plot = registry.plot("p_decay").unwrap();
    assert_eq!(plot.x, "rt_decay.k1");
    assert_eq!(plot.y, vec!["rt_decay.S1", "rt_decay.S2"]);

    let table = exp.run_report(&mut backend, "r_decay").unwrap();
    // One-step runs produce a start and an end row per sweep value.
    assert_eq!(table.num_rows(), 6);
    assert_eq!(
        table.column("rt_decay.k1").unwrap(),
        vec![0.1, 0.1, 0.5, 0.5, 1.0, 1.0]
    );
    let s1 = table.column("rt_decay.S1").unwrap();
    assert_relative_eq!(s1[1], 10.0 * (-0.1f64 * 0.5).exp(), epsilon = 1e-9);
    assert_relative_eq!(s1[5], 10.0 * (-1.0f64 * 0.5).exp(), epsilon = 1e-9);
}

#[test]
fn scan_templates_reject_time_course_simulations() {
    let mut backend = DecayBackend::new();
    let err = SingleModelParameterScan::new(ModelSpec::new(DECAY), scan())
        .with_simulation(SimulationSpec::uniform(0.0, 10.0))
        .build(ExperimentConfig::default(), &mut backend)
        .unwrap_err();
    match err {
        ExperimentError::InvalidSimulation { id, .. } => assert_eq!(id, "s_project"),
        other => panic!("expected InvalidSimulation, got {other:?}"),
    }
}

#[test]
fn multiple_model_scan_compares_models() {
    let mut backend = DecayBackend::new();
    let exp = MultipleModelParameterScan::new(
        vec![ModelSpec::new(DECAY), ModelSpec::new(FAST_DECAY)],
        scan(),
    )
    .build(ExperimentConfig::default(), &mut backend)
    .unwrap();

    let registry = exp.registry();
    assert_eq!(registry.task("task_model1").unwrap().model_id, "model1");
    assert_eq!(
        registry.repeated_task("rtask_model0").unwrap().subtask_id,
        "task_model0"
    );
    assert_eq!(
        registry.report("mmtc_report1").unwrap().variables,
        vec![
            "rtask_model0.k1",
            "rtask_model1.k1",
            "rtask_model0.S1",
            "rtask_model1.S1",
            "rtask_model0.S2",
            "rtask_model1.S2"
        ]
    );

    let plot = registry.plot("mmtc_plot1_S2").unwrap();
    assert_eq!(plot.x, "rtask_model0.k1");
    assert_eq!(plot.y, vec!["rtask_model0.S2", "rtask_model1.S2"]);

    let execution = exp.execute(&mut backend).unwrap();
    assert_eq!(execution.report_id.as_deref(), Some("mmtc_report1"));
    assert_eq!(execution.table.num_rows(), 6);
    assert_eq!(execution.warnings.len(), 1);
}
