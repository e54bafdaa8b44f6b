//! Program manager behavior over the recording driver: cache
//! determinism, order sensitivity, uniform persistence and the
//! parallel-compile path.

mod common;

use batchwork::{
    CompilePoll, GpuDriver, HeadlessDriver, InjectionPoint, ProgramManager, ProgramSubmit,
    ShaderAddition, ShaderError, UniformValue,
};

const VERT: &str = "#version 100\n\
     #pragma slot(vertexHeader)\n\
     void main ()\n\
     {\n\
     #pragma slot(vertexBody)\n\
     }\n";

const FRAG: &str = "#version 100\n\
     #pragma slot(extensions)\n\
     #pragma slot(fragmentDefine)\n\
     #pragma slot(fragmentHeader)\n\
     void main ()\n\
     {\n\
     #pragma slot(fragmentBody)\n\
     }\n";

fn manager() -> ProgramManager {
    let mut manager = ProgramManager::new(Vec::new(), None);
    manager.set_base_shader("Test", VERT, FRAG);
    manager
}

fn body_addition(name: &str) -> ShaderAddition {
    ShaderAddition::new(name).with_snippet(
        InjectionPoint::FragmentBody,
        &format!("    // {}", name),
    )
}

#[test]
fn identical_states_compile_once_and_share_the_suite() {
    let mut driver = common::driver(16);
    let mut manager = manager();
    manager.add_addition(body_addition("Tint"));

    let first = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .unwrap()
        .program;
    let second = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .unwrap()
        .program;

    assert_eq!(first, second);
    assert_eq!(driver.compile_count(), 1);
}

#[test]
fn toggling_between_seen_states_never_recompiles() {
    let mut driver = common::driver(16);
    let mut manager = manager();
    manager.add_addition(body_addition("Tint"));
    manager.add_addition(body_addition("Lighting").with_disable(true));

    let unlit = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .unwrap()
        .program;

    manager.get_addition_mut("Lighting").unwrap().disable = false;
    let lit = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .unwrap()
        .program;
    assert_ne!(unlit, lit);
    assert_eq!(driver.compile_count(), 2);

    // Back and forth across both known states: cache hits only.
    for _ in 0..3 {
        manager.get_addition_mut("Lighting").unwrap().disable = true;
        assert_eq!(
            manager
                .get_current_program_suite(&mut driver)
                .unwrap()
                .unwrap()
                .program,
            unlit
        );
        manager.get_addition_mut("Lighting").unwrap().disable = false;
        assert_eq!(
            manager
                .get_current_program_suite(&mut driver)
                .unwrap()
                .unwrap()
                .program,
            lit
        );
    }
    assert_eq!(driver.compile_count(), 2);
}

#[test]
fn addition_order_produces_distinct_variants() {
    let mut driver = common::driver(16);
    let mut manager = manager();
    manager.add_addition(body_addition("A"));
    manager.add_addition(body_addition("B"));

    let forward = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .unwrap()
        .program;

    // Reorder: move A behind B.
    let a = manager.get_addition("A").unwrap().clone();
    manager.remove_addition("A");
    manager.add_addition(a);

    let reversed = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .unwrap()
        .program;

    assert_ne!(forward, reversed);
    assert_eq!(driver.compile_count(), 2);

    let sources = driver.compiled_programs();
    let first_body = &sources[0].fragment_source;
    assert!(first_body.find("// A").unwrap() < first_body.find("// B").unwrap());
    let second_body = &sources[1].fragment_source;
    assert!(second_body.find("// B").unwrap() < second_body.find("// A").unwrap());
}

#[test]
fn uniforms_persist_across_program_swaps() {
    let mut driver = common::driver(16);
    let mut manager = manager();
    manager.set_uniform("uResolution", [640.0, 480.0]);

    let unlit = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .unwrap()
        .program;
    manager.apply_uniforms(&mut driver, unlit);

    manager.add_addition(body_addition("Lighting"));
    let lit = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .unwrap()
        .program;
    manager.apply_uniforms(&mut driver, lit);

    let pushed = driver.uniforms_for(lit);
    assert!(pushed
        .iter()
        .any(|(name, value)| *name == "uResolution"
            && **value == UniformValue::Vec2([640.0, 480.0])));
}

#[test]
fn pending_compiles_resolve_across_polls_without_recompiling() {
    let mut driver = HeadlessDriver::new(16).with_compile_latency(2);
    common::init_logging();
    let mut manager = manager();

    // Submission frame: compile goes into flight.
    assert!(manager.get_current_program_suite(&mut driver).unwrap().is_none());
    // First poll is still pending.
    assert!(manager.get_current_program_suite(&mut driver).unwrap().is_none());
    // Second poll completes and the suite is cached.
    let suite = manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .expect("compile should have completed");
    let program = suite.program;

    assert_eq!(driver.compile_count(), 1);
    assert_eq!(
        manager
            .get_current_program_suite(&mut driver)
            .unwrap()
            .unwrap()
            .program,
        program
    );
}

#[test]
fn compile_failures_poison_the_key() {
    let mut driver = HeadlessDriver::new(16).fail_when_source_contains("@broken");
    common::init_logging();
    let mut manager = manager();
    manager.add_addition(
        ShaderAddition::new("Broken").with_snippet(InjectionPoint::FragmentBody, "    @broken"),
    );

    let first = manager.get_current_program_suite(&mut driver).unwrap_err();
    let second = manager.get_current_program_suite(&mut driver).unwrap_err();
    assert_eq!(first, second);
    assert!(matches!(first, ShaderError::Compile { .. }));
    assert_eq!(driver.compile_count(), 0);

    // A different configuration is a fresh key and still compiles.
    manager.remove_addition("Broken");
    assert!(manager
        .get_current_program_suite(&mut driver)
        .unwrap()
        .is_some());
}

#[test]
fn snippets_without_a_marker_fail_synthesis() {
    let mut driver = common::driver(16);
    let mut manager = ProgramManager::new(Vec::new(), None);
    manager.set_base_shader("Bare", "void main () {}", "void main () {}");
    manager.add_addition(
        ShaderAddition::new("NeedsBody").with_snippet(InjectionPoint::FragmentBody, "    body();"),
    );

    let err = manager.get_current_program_suite(&mut driver).unwrap_err();
    assert_eq!(
        err,
        ShaderError::MissingSlot {
            shader: "Bare".to_string(),
            addition: "NeedsBody".to_string(),
            slot: "fragmentBody",
        }
    );
}

#[test]
fn features_reach_both_stages_of_the_compiled_source() {
    let mut driver = common::driver(16);
    let mut manager = manager();
    manager.add_feature("SELF_SHADOW");

    manager.get_current_program_suite(&mut driver).unwrap();

    let compiled = &driver.compiled_programs()[0];
    assert!(compiled
        .vertex_source
        .contains("#define FEATURE_SELF_SHADOW"));
    assert!(compiled
        .fragment_source
        .contains("#define FEATURE_SELF_SHADOW"));
}

#[test]
fn driver_poll_contract_round_trips() {
    // Direct driver-level check of the tri-state poll used above.
    let mut driver = HeadlessDriver::new(16).with_compile_latency(1);
    let ProgramSubmit::Pending(token) = driver.submit_program("T", "v", "f").unwrap() else {
        panic!("expected a pending token");
    };
    match driver.poll_program(token) {
        CompilePoll::Ready(_) => {}
        other => panic!("expected ready, got {:?}", other),
    }
}
