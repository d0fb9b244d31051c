//! End-to-end job processing

use std::sync::Arc;

use lapsekit_core::{AxisMode, DiagnosticKind, StrategyDecision};
use lapsekit_parser::GcodeParser;
use lapsekit_position::{PositionArgs, PositionTracker};
use lapsekit_stabilization::{
    render_gcode, GcodeProcessor, GcodeProcessorArgs, MinimumInterval, ParsePolicy,
    ProcessingReport, SnapshotPlan, SnapshotPlanStep, StrategyKind,
};

/// Three layers: two eligible points 5 mm apart, none, then one.
const THREE_LAYERS: &[&str] = &[
    "G28",
    "G90",
    "M82",
    "G92 E0",
    "G1 Z0.2 F3000",
    "G1 X10 Y10 E1 F1200",
    "G1 E0",
    "G1 X15 Y10 F6000",
    "G1 E1",
    "G1 X20 Y20 E2 F1200",
    "G1 Z0.4",
    "G1 X30 Y20 E3",
    "G1 X40 Y20 E4",
    "G1 Z0.6",
    "G1 X40 Y30 E5",
    "G1 E4",
    "G1 X50 Y30 E5",
    "G1 X60 Y30 E6",
];

fn run(args: GcodeProcessorArgs, lines: &[&str]) -> ProcessingReport {
    GcodeProcessor::new(Arc::new(args))
        .unwrap()
        .process_lines(lines.iter().copied())
}

fn plan_lines(report: &ProcessingReport) -> Vec<usize> {
    report.plans.iter().map(SnapshotPlan::line_index).collect()
}

fn decisions(report: &ProcessingReport) -> Vec<StrategyDecision> {
    report
        .diagnostics
        .iter()
        .filter_map(|d| match &d.kind {
            DiagnosticKind::Decision(decision) => Some(decision.clone()),
            _ => None,
        })
        .collect()
}

/// Synthetic print with `layers` layers, retracting once in the chosen ones
fn synthetic_print(layers: usize, retract_in: impl Fn(usize) -> bool) -> Vec<String> {
    let mut lines = vec!["G28".to_string(), "M83".to_string()];
    for layer in 0..layers {
        let z = 0.2 * (layer + 1) as f64;
        lines.push(format!("G1 Z{:.1} F3000", z));
        lines.push("G1 X20 Y20 E1 F1200".to_string());
        lines.push("G1 X80 Y20 E2".to_string());
        if retract_in(layer) {
            lines.push("G1 E-0.8".to_string());
            lines.push("G1 X100 Y50 F6000".to_string());
            lines.push("G1 E0.8".to_string());
        }
        lines.push("G1 X80 Y80 E2 F1200".to_string());
    }
    lines
}

#[test]
fn test_three_layer_print_yields_two_plans() {
    let report = run(GcodeProcessorArgs::default(), THREE_LAYERS);

    assert!(report.is_complete());
    // Line 7 is closer to the default parking position than line 6.
    assert_eq!(plan_lines(&report), vec![7, 15]);
    let decisions = decisions(&report);
    assert_eq!(decisions.len(), 3);
    assert!(matches!(
        decisions[0],
        StrategyDecision::LayerSnapshot {
            layer: 1,
            chosen_line: 7,
            candidates: 2,
            ..
        }
    ));
    assert_eq!(decisions[1], StrategyDecision::LayerSkipped { layer: 2 });
    assert!(matches!(
        decisions[2],
        StrategyDecision::LayerSnapshot {
            layer: 3,
            chosen_line: 15,
            candidates: 1,
            ..
        }
    ));
}

#[test]
fn test_one_plan_per_layer() {
    let lines = synthetic_print(6, |_| true);
    let report = GcodeProcessor::new(Arc::new(GcodeProcessorArgs::default()))
        .unwrap()
        .process_lines(&lines);

    assert_eq!(report.plans.len(), 6);
    let layers: Vec<u32> = report
        .plans
        .iter()
        .map(|p| p.trigger.position.layer)
        .collect();
    assert_eq!(layers, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn test_layers_without_candidates_get_no_plan() {
    let lines = synthetic_print(6, |layer| layer % 2 == 0);
    let report = GcodeProcessor::new(Arc::new(GcodeProcessorArgs::default()))
        .unwrap()
        .process_lines(&lines);

    let layers: Vec<u32> = report
        .plans
        .iter()
        .map(|p| p.trigger.position.layer)
        .collect();
    assert_eq!(layers, vec![1, 3, 5]);
    let skipped = decisions(&report)
        .into_iter()
        .filter(|d| matches!(d, StrategyDecision::LayerSkipped { .. }))
        .count();
    assert_eq!(skipped, 3);
}

#[test]
fn test_return_step_restores_trigger_state() {
    let report = run(GcodeProcessorArgs::default(), THREE_LAYERS);
    for plan in &report.plans {
        let position = plan.trigger.position;
        match plan.steps.last() {
            Some(SnapshotPlanStep::Return { target, feedrate }) => {
                assert_eq!(*target, position.coordinates());
                assert_eq!(*feedrate, position.f);
            }
            other => panic!("last step is not a return: {:?}", other),
        }
    }
}

#[test]
fn test_strict_job_aborts_on_malformed_line() {
    let mut lines = THREE_LAYERS.to_vec();
    lines.insert(9, "G1 X# Y2");

    let args = GcodeProcessorArgs {
        parse_policy: ParsePolicy::Strict,
        ..Default::default()
    };
    let report = run(args, &lines);
    assert_eq!(report.aborted_at, Some(9));
    assert!(report.plans.is_empty());
    assert_eq!(report.line_count, 10);
}

#[test]
fn test_permissive_job_skips_malformed_line() {
    let mut lines = THREE_LAYERS.to_vec();
    lines.insert(9, "G1 X# Y2");

    let report = run(GcodeProcessorArgs::default(), &lines);
    assert!(report.is_complete());
    assert_eq!(plan_lines(&report), vec![7, 16]);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.line_index == 9 && matches!(d.kind, DiagnosticKind::Parse(_))));
}

#[test]
fn test_annotated_marks_plan_lines() {
    let report = run(GcodeProcessorArgs::default(), THREE_LAYERS);
    let annotated = report.annotated();
    assert_eq!(annotated.len(), THREE_LAYERS.len());
    let marked: Vec<usize> = annotated
        .iter()
        .filter(|(_, plan)| plan.is_some())
        .map(|(index, _)| *index)
        .collect();
    assert_eq!(marked, vec![7, 15]);
}

#[test]
fn test_fine_grained_strategy() {
    let mut args = GcodeProcessorArgs::default();
    args.stabilization.strategy = StrategyKind::Gcode;
    args.stabilization.minimum_interval = MinimumInterval::Millimeters(4.0);
    assert_eq!(plan_lines(&run(args.clone(), THREE_LAYERS)), vec![6, 7, 15]);

    args.stabilization.minimum_interval = MinimumInterval::Millimeters(1000.0);
    assert_eq!(plan_lines(&run(args.clone(), THREE_LAYERS)), vec![6]);

    let mut lines = THREE_LAYERS.to_vec();
    lines.insert(14, "@LAPSE TAKE-SNAPSHOT");
    assert_eq!(plan_lines(&run(args, &lines)), vec![6, 16]);
}

#[test]
fn test_host_snapshot_at_same_spot_waits_for_movement() {
    let mut args = GcodeProcessorArgs::default();
    args.stabilization.strategy = StrategyKind::Gcode;
    args.stabilization.minimum_interval = MinimumInterval::Millimeters(1000.0);

    // Requested right after the snapshot at line 6, before the head moves
    let mut lines = THREE_LAYERS.to_vec();
    lines.insert(7, "@LAPSE TAKE-SNAPSHOT");
    assert_eq!(plan_lines(&run(args, &lines)), vec![6, 8]);
}

#[test]
fn test_processors_are_independent() {
    let args = Arc::new(GcodeProcessorArgs::default());
    let a = GcodeProcessor::new(Arc::clone(&args)).unwrap();
    let b = GcodeProcessor::new(Arc::clone(&args)).unwrap();
    assert_ne!(a.id(), b.id());

    let first = a.process_lines(THREE_LAYERS.iter().copied());
    let second = b.process_lines(THREE_LAYERS.iter().copied());
    assert_eq!(first.plans, second.plans);
}

/// Replay each rendered plan on a copy of the tracker at the trigger line
fn assert_replay_restores(args: GcodeProcessorArgs, lines: &[&str]) {
    let report = run(args.clone(), lines);
    assert!(!report.plans.is_empty());
    let parser = GcodeParser::default();

    for plan in &report.plans {
        let mut tracker = PositionTracker::new(args.position.clone()).unwrap();
        for (index, line) in lines.iter().enumerate().take(plan.line_index() + 1) {
            tracker.update(&parser.parse_line(line, index).unwrap()).unwrap();
        }
        let before = *tracker.current();
        let extruder_before = *tracker.extruder();

        let mut replay = tracker.clone();
        for (offset, line) in render_gcode(plan, &args.snapshot).iter().enumerate() {
            let parsed = parser.parse_line(line, lines.len() + offset).unwrap();
            replay.update(&parsed).unwrap();
        }
        let after = *replay.current();

        assert_eq!(after.coordinates(), before.coordinates());
        assert_eq!(after.f, before.f);
        assert_eq!(after.positioning, before.positioning);
        assert_eq!(after.extrusion, before.extrusion);
        assert_eq!(after.units, before.units);
        assert_eq!(after.layer, before.layer);
        assert_eq!(replay.extruder().e, extruder_before.e);
        assert_eq!(replay.extruder().state, extruder_before.state);
    }
}

#[test]
fn test_rendered_plan_round_trips_absolute() {
    let mut args = GcodeProcessorArgs::default();
    args.snapshot.lift_height_mm = Some(0.5);
    assert_replay_restores(args, THREE_LAYERS);
}

#[test]
fn test_rendered_plan_round_trips_relative_with_g90_extruder() {
    let lines = [
        "G28",
        "G1 Z0.2 F3000",
        "G91",
        "M82",
        "G92 E0",
        "G1 X10 Y10 E1 F1200",
        "G1 E0",
        "G1 X5",
        "G1 E1",
        "G1 X5 E2",
    ];
    let args = GcodeProcessorArgs {
        position: PositionArgs {
            g90_influences_extruder: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let report = run(args.clone(), &lines);
    let plan = &report.plans[0];
    assert_eq!(plan.initial.positioning, AxisMode::Relative);
    assert_eq!(plan.initial.extrusion, AxisMode::Absolute);
    assert_replay_restores(args, &lines);
}

#[test]
fn test_rendered_plan_round_trips_inches() {
    let lines = [
        "G28",
        "G20",
        "G1 Z0.01 F100",
        "M83",
        "G1 X1 Y1 E0.04 F50",
        "G1 E-0.04",
        "G1 X2",
        "G1 E0.04",
        "G1 X3 E0.04",
    ];
    let mut args = GcodeProcessorArgs::default();
    args.position.retraction_threshold = 0.5;
    assert_replay_restores(args, &lines);
}
