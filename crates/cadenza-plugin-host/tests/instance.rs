mod common;

use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;

use cadenza_plugin_host::{
    hints, CallbackKind, ExternalNote, HostError, InstanceId, LifecycleState, MidiProgram,
    ParameterData, PluginFormat, PostEventKind, PARAMETER_BALANCE_RIGHT,
};

use common::{load_instance, unit_parameter, StubLayout};

fn synth_layout() -> StubLayout {
    StubLayout {
        audio_ins: 2,
        audio_outs: 2,
        wants_midi_in: true,
        parameters: vec![unit_parameter(7), unit_parameter(9)],
        programs: vec!["Init".into(), "Bright".into()],
        midi_programs: vec![MidiProgram {
            bank: 0,
            program: 3,
            name: "Organ".into(),
        }],
    }
}

#[test]
fn load_builds_ports_and_tables() {
    let rig = load_instance(PluginFormat::Vst2, synth_layout());
    let instance = &rig.instance;

    assert_eq!(instance.state(), LifecycleState::Loaded);
    assert_eq!(instance.audio_in_count(), 2);
    assert_eq!(instance.audio_out_count(), 2);
    assert_eq!(instance.midi_in_count(), 1);
    assert_eq!(instance.midi_out_count(), 0);
    assert_eq!(instance.parameter_count(), 2);
    assert_eq!(instance.parameter_count_info(), (2, 0, 2));
    assert_eq!(instance.program_count(), 2);
    assert_eq!(instance.current_program(), -1);
    assert_eq!(instance.midi_program_count(), 1);
    assert_eq!(instance.current_midi_program(), -1);
    assert_eq!(instance.name(), Some("stub"));
}

#[test]
fn load_rejects_missing_binary() {
    use cadenza_plugin_host::{AudioServer, HostHandles, PluginInstance};
    use common::{StubBackend, StubServer};
    use std::sync::Arc;

    let server = Arc::new(StubServer::default());
    let mut instance = PluginInstance::new(
        PluginFormat::Ladspa,
        HostHandles {
            server: server as Arc<dyn AudioServer>,
            broadcast: None,
            observer: None,
        },
    );
    let result = instance.load(
        std::path::Path::new("/nonexistent/plugin.so"),
        "ghost",
        Box::new(StubBackend::new(StubLayout::default())),
    );
    assert!(matches!(result, Err(HostError::MissingBinary(_))));
    assert_eq!(instance.state(), LifecycleState::Constructed);
}

#[test]
fn clamped_set_stores_and_broadcasts_the_fixed_value() {
    let rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.broadcast.take();
    rig.observer.take();

    rig.instance.set_parameter_value(0, 1.5, true, true);

    assert_eq!(rig.values.lock().unwrap()[0], 1.0);

    let broadcasts = rig.broadcast.take();
    assert_eq!(broadcasts.len(), 1);
    match &broadcasts[0].1 {
        cadenza_plugin_host::HostMessage::SetParameterValue { index, value } => {
            assert_eq!(*index, 0);
            assert_eq!(*value, 1.0);
        }
        other => panic!("unexpected broadcast {other:?}"),
    }

    let events = rig.observer.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, CallbackKind::ParameterChanged);
    assert_eq!(events[0].value, 1.0);
}

#[test]
fn setting_a_parameter_twice_is_idempotent() {
    let rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.set_parameter_value(0, 1.5, false, false);
    let first = rig.values.lock().unwrap()[0];
    rig.instance.set_parameter_value(0, first, false, false);
    assert_eq!(rig.values.lock().unwrap()[0], first);
}

#[test]
fn rindex_scan_applies_first_match_only() {
    let mut layout = synth_layout();
    // Two table entries claiming the same native index.
    layout.parameters = vec![unit_parameter(7), unit_parameter(7)];
    let rig = load_instance(PluginFormat::Vst2, layout);

    rig.instance
        .set_parameter_value_by_rindex(7, 0.25, false, false);

    let values = rig.values.lock().unwrap();
    assert_eq!(values[0], 0.25);
    assert_eq!(values[1], 0.5, "later duplicates are not applied");
}

#[test]
fn bridge_reserved_indices_route_to_dedicated_setters() {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.add_hints(hints::IS_BRIDGE);

    rig.instance
        .set_parameter_value_by_rindex(PARAMETER_BALANCE_RIGHT, 0.5, false, false);

    assert_eq!(rig.instance.balance_right(), 0.5);
    assert_eq!(rig.instance.balance_left(), -1.0, "left must be untouched");
    // The parameter table itself is untouched by reserved indices.
    assert_eq!(rig.values.lock().unwrap()[0], 0.5);
}

#[test]
fn global_controls_clamp_into_their_ranges() {
    let rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.set_dry_wet(7.0, false, false);
    rig.instance.set_volume(9.0, false, false);
    rig.instance.set_balance_left(-4.0, false, false);
    assert_eq!(rig.instance.dry_wet(), 1.0);
    assert_eq!(rig.instance.volume(), 1.27);
    assert_eq!(rig.instance.balance_left(), -1.0);
}

#[test]
fn program_switch_resnapshots_parameter_defaults() {
    let rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.set_parameter_value(0, 0.9, false, false);
    rig.instance.set_parameter_value(1, 0.1, false, false);

    rig.instance.set_program(1, false, false);

    assert_eq!(rig.instance.current_program(), 1);
    for index in 0..rig.instance.parameter_count() {
        let ranges = rig.instance.parameter_ranges(index).unwrap();
        let current = rig.instance.parameter_value(index).unwrap();
        assert_eq!(ranges.default, current);
    }
}

#[test]
fn midi_program_resnapshot_depends_on_format() {
    for (format, expect_resnapshot) in [(PluginFormat::Dssi, false), (PluginFormat::Sf2, true)] {
        let rig = load_instance(format, synth_layout());
        rig.instance.set_parameter_value(0, 0.9, false, false);

        rig.instance.set_midi_program(0, false, false);

        let default = rig.instance.parameter_ranges(0).unwrap().default;
        if expect_resnapshot {
            assert_eq!(default, 0.9, "{format:?} must re-snapshot defaults");
        } else {
            assert_eq!(default, 0.5, "{format:?} must keep defaults");
        }
    }
}

#[test]
fn midi_program_lookup_by_bank_program() {
    let rig = load_instance(PluginFormat::Sf2, synth_layout());
    rig.instance
        .set_midi_program_by_bank_program(0, 3, false, false);
    assert_eq!(rig.instance.current_midi_program(), 0);

    rig.instance
        .set_midi_program_by_bank_program(9, 9, false, false);
    assert_eq!(rig.instance.current_midi_program(), 0, "no match, no change");
}

#[test]
fn mismatched_instance_id_fires_one_diagnostic_and_mutates_nothing() {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.set_id(InstanceId(3));
    rig.observer.take();

    assert!(!rig.instance.accepts_message(InstanceId(5)));

    let events = rig.observer.take();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, CallbackKind::Debug);
    assert_eq!(events[0].instance, InstanceId(5));
    assert_eq!(events[0].index, 3);

    assert!(rig.instance.accepts_message(InstanceId(3)));
    assert!(rig.observer.take().is_empty());
}

#[test]
fn process_splices_injected_notes_ahead_of_host_events() {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.activate().unwrap();
    rig.instance.set_active(true, false, false);

    rig.instance.send_midi_note(true, 60, 100, false, false);
    rig.instance.send_midi_note(true, 64, 90, false, false);

    let host_note = ExternalNote {
        on: true,
        note: 72,
        velocity: 80,
    };
    rig.instance.process(128, &[host_note]);

    let cycles = rig.seen_notes.lock().unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(
        cycles[0]
            .iter()
            .map(|note| note.note)
            .collect::<Vec<u8>>(),
        vec![60, 64, 72]
    );
    drop(cycles);

    // Next cycle sees no leftovers from the injection queue.
    rig.instance.process(128, &[]);
    assert!(rig.seen_notes.lock().unwrap()[1].is_empty());
}

#[test]
fn inactive_instance_drains_but_does_not_process() {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.activate().unwrap();

    rig.instance.send_midi_note(true, 60, 100, false, false);
    rig.instance.process(128, &[]);
    assert_eq!(rig.process_calls.load(Ordering::Relaxed), 0);
}

#[test]
fn deactivating_the_processing_flag_sends_one_silencing_cycle() {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.activate().unwrap();
    rig.instance.set_active(true, false, false);
    rig.instance.process(128, &[]);

    rig.instance.set_active(false, false, false);
    rig.instance.process(128, &[]);
    rig.instance.process(128, &[]);

    assert_eq!(rig.process_calls.load(Ordering::Relaxed), 2);
    let cycles = rig.seen_notes.lock().unwrap();
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[1].len(), 128);
    assert!(cycles[1].iter().all(|note| !note.on));
}

#[test]
fn all_notes_off_reaches_both_queues() {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.activate().unwrap();
    rig.instance.set_active(true, false, false);

    rig.instance.send_all_notes_off();

    rig.instance.process(128, &[]);
    let cycles = rig.seen_notes.lock().unwrap();
    assert_eq!(cycles[0].len(), 128);
    assert!(cycles[0].iter().all(|note| !note.on));
    drop(cycles);

    let mut deferred = Vec::new();
    rig.instance.drain_deferred(&mut deferred);
    let offs: Vec<i32> = deferred
        .iter()
        .filter(|event| event.kind == PostEventKind::NoteOff)
        .map(|event| event.index)
        .collect();
    assert_eq!(offs, (0..128).collect::<Vec<i32>>());
}

#[test]
fn lifecycle_rejects_out_of_order_transitions() -> anyhow::Result<()> {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    assert!(rig.instance.deactivate().is_err());
    rig.instance.activate()?;
    assert!(matches!(
        rig.instance.reload(),
        Err(HostError::InvalidState(_))
    ));
    assert!(rig.instance.activate().is_err());
    rig.instance.deactivate()?;
    rig.instance.reload()?;
    assert_eq!(rig.instance.state(), LifecycleState::Deactivated);
    Ok(())
}

#[test]
fn reload_replaces_tables_wholesale() {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.set_program(1, false, false);
    assert_eq!(rig.instance.current_program(), 1);

    rig.instance.activate().unwrap();
    rig.instance.deactivate().unwrap();
    rig.instance.reload().unwrap();

    assert_eq!(rig.instance.current_program(), -1, "cursor reset on reload");
    assert_eq!(rig.instance.parameter_count(), 2);
}

#[test]
fn removal_deactivates_before_unregistering_and_leaves_instance_inert() {
    let mut rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.activate().unwrap();
    rig.instance.set_active(true, false, false);
    rig.server.ops.lock().unwrap().clear();

    rig.instance.remove();

    let ops = rig.server.ops.lock().unwrap().clone();
    let deactivate_at = ops.iter().position(|op| op == "deactivate").unwrap();
    let first_unregister = ops.iter().position(|op| op == "unregister").unwrap();
    assert!(
        deactivate_at < first_unregister,
        "the callback must stop observing the instance before ports are freed"
    );
    assert!(rig.server.registered.lock().unwrap().is_empty());
    assert_eq!(rig.instance.state(), LifecycleState::Removed);
    assert_eq!(rig.instance.name(), None);
    assert_eq!(rig.instance.parameter_count(), 0);
    assert!(!rig.instance.library().is_open());

    // Invoking the audio callback after removal must touch nothing.
    let calls_before = rig.process_calls.load(Ordering::Relaxed);
    rig.instance.process(128, &[]);
    assert_eq!(rig.process_calls.load(Ordering::Relaxed), calls_before);
}

#[test]
fn removal_of_partially_constructed_instance_is_safe() {
    use cadenza_plugin_host::{AudioServer, HostHandles, PluginInstance};
    use common::StubServer;
    use std::sync::Arc;

    let server = Arc::new(StubServer::default());
    let mut instance = PluginInstance::new(
        PluginFormat::Lv2,
        HostHandles {
            server: server as Arc<dyn AudioServer>,
            broadcast: None,
            observer: None,
        },
    );
    instance.remove();
    assert_eq!(instance.state(), LifecycleState::Removed);
}

#[test]
fn custom_data_upserts_and_filters() {
    use cadenza_plugin_host::CustomDataKind;

    let rig = load_instance(PluginFormat::Vst2, synth_layout());
    assert!(rig
        .instance
        .set_custom_data(CustomDataKind::String, "patch", "a"));
    assert!(rig
        .instance
        .set_custom_data(CustomDataKind::String, "patch", "b"));
    assert!(!rig
        .instance
        .set_custom_data(CustomDataKind::String, "OSC:port", "9000"));
    assert!(!rig
        .instance
        .set_custom_data(CustomDataKind::Invalid, "junk", "x"));

    let data = rig.instance.custom_data();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].value, "b");
}

#[test]
fn parameter_midi_assignment_writes_the_table() {
    let rig = load_instance(PluginFormat::Vst2, synth_layout());
    rig.instance.set_parameter_midi_channel(0, 9);
    rig.instance.set_parameter_midi_cc(0, 74);
    let data: ParameterData = rig.instance.parameter_data(0).unwrap();
    assert_eq!(data.midi_channel, 9);
    assert_eq!(data.midi_cc, 74);
}
