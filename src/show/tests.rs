// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::show::{ChaserEntry, PatchEntry, ShowFile, StepEntry};
use crate::cue::{ChannelTime, Timing};
use crate::curve::{Curve, CurveKind, LINEAR_CURVE};
use crate::dmx::mock::MockTransport;
use crate::error::ShowError;
use crate::fader::{FaderContent, FaderSource};
use crate::group::Group;
use crate::independent::Independent;
use crate::levels::Level;
use crate::patch::Address;
use crate::testutil::eventually;

use super::{LightShow, ShowSettings};

fn show() -> (LightShow, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let mut show = LightShow::new(ShowSettings::default(), transport.clone());
    show.patch_1on1();
    (show, transport)
}

fn entry(memory: f64, channels: &[(u16, Level)], timing: Timing) -> StepEntry {
    StepEntry {
        memory,
        text: format!("cue {}", memory),
        channels: channels.iter().copied().collect(),
        timing,
        channel_time: BTreeMap::new(),
    }
}

fn levels(channels: &[(u16, Level)]) -> BTreeMap<u16, Level> {
    channels.iter().copied().collect()
}

#[test]
fn test_go_fades_user_level_out_and_step_in() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    show.import_main_playback(&[entry(1.0, &[(2, 255)], Timing::fade(2.0))])?;

    show.set_channel_level(1, 255)?;
    assert_eq!(255, transport.output(1, 1));

    let start = Instant::now();
    assert!(show.do_go_at(start));
    assert!(show.is_fading());
    assert_eq!(None, show.user_level(1));

    show.tick(start + Duration::from_secs(1));
    let faded_out = transport.output(1, 1);
    assert!((127..=128).contains(&faded_out), "got {}", faded_out);
    assert_eq!(128, transport.output(1, 2));

    show.tick(start + Duration::from_secs(2));
    assert_eq!(0, transport.output(1, 1));
    assert_eq!(255, transport.output(1, 2));
    assert!(!show.is_fading());
    assert_eq!(1, show.main().position());
    assert!(!show.main().on_go());
    Ok(())
}

#[test]
fn test_go_during_fade_is_ignored() -> Result<(), ShowError> {
    let (mut show, _) = show();
    show.import_main_playback(&[
        entry(1.0, &[(1, 255)], Timing::fade(1.0)),
        entry(2.0, &[(2, 255)], Timing::fade(1.0)),
    ])?;

    let start = Instant::now();
    assert!(show.do_go_at(start));
    assert!(!show.do_go_at(start + Duration::from_millis(500)));
    assert!(!show.go_back_at(start + Duration::from_millis(500)));

    show.tick(start + Duration::from_secs(1));
    assert_eq!(1, show.main().position());
    assert!(show.do_go_at(start + Duration::from_secs(1)));
    show.tick(start + Duration::from_secs(2));
    assert_eq!(2, show.main().position());

    // Clamped at the last step.
    assert!(!show.do_go_at(start + Duration::from_secs(3)));
    Ok(())
}

#[test]
fn test_go_back_and_goto() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    show.import_main_playback(&[
        entry(1.0, &[(1, 100)], Timing::default()),
        entry(2.0, &[(1, 200)], Timing::default()),
        entry(3.0, &[(1, 50)], Timing::default()),
    ])?;
    assert!(!show.go_back());

    let now = Instant::now();
    assert!(show.do_go_at(now));
    assert!(show.do_go_at(now));
    assert_eq!(2, show.main().position());
    assert_eq!(200, transport.output(1, 1));

    // Instant steps complete inside the Go.
    assert!(show.go_back_at(now));
    assert_eq!(1, show.main().position());
    assert_eq!(100, transport.output(1, 1));

    assert!(show.goto_at(3, now)?);
    assert_eq!(3, show.main().position());
    assert_eq!(50, transport.output(1, 1));

    assert!(show.goto_at(0, now)?);
    assert_eq!(0, transport.output(1, 1));
    assert_eq!(Err(ShowError::UnknownStep(4)), show.goto_at(4, now));
    Ok(())
}

#[test]
fn test_user_level_set_during_go_applies_when_fade_ends() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    show.import_main_playback(&[entry(1.0, &[(2, 255)], Timing::fade(2.0))])?;

    let start = Instant::now();
    assert!(show.do_go_at(start));
    show.set_channel_level(5, 200)?;
    assert_eq!(0, transport.output(1, 5));

    show.tick(start + Duration::from_secs(3));
    assert!(!show.is_fading());
    assert_eq!(200, show.output_level(5)?);
    assert_eq!(200, transport.output(1, 5));
    Ok(())
}

#[test]
fn test_go_back_uses_previous_step_timing() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    let slow = Timing {
        time_in: 2.0,
        time_out: 4.0,
        wait: 1.0,
        ..Default::default()
    };
    show.import_main_playback(&[
        entry(1.0, &[(1, 200)], slow),
        entry(2.0, &[(1, 100), (2, 255)], Timing::fade(1.0)),
    ])?;

    let start = Instant::now();
    assert!(show.do_go_at(start));
    show.tick(start + Duration::from_secs(5));
    assert!(show.do_go_at(start + Duration::from_secs(5)));
    show.tick(start + Duration::from_secs(6));
    assert_eq!(2, show.main().position());
    assert_eq!(100, transport.output(1, 1));
    assert_eq!(255, transport.output(1, 2));

    let back = start + Duration::from_secs(6);
    assert!(show.go_back_at(back));

    // Nothing moves during step 1's wait.
    show.tick(back + Duration::from_millis(500));
    assert_eq!(100, transport.output(1, 1));
    assert_eq!(255, transport.output(1, 2));

    // One second in: channel 1 rises over time_in (2s), channel 2 falls over time_out (4s).
    show.tick(back + Duration::from_secs(2));
    assert_eq!(150, transport.output(1, 1));
    assert_eq!(192, transport.output(1, 2));

    show.tick(back + Duration::from_secs(3));
    assert_eq!(200, transport.output(1, 1));
    assert_eq!(128, transport.output(1, 2));
    assert!(show.is_fading());

    show.tick(back + Duration::from_secs(5));
    assert!(!show.is_fading());
    assert_eq!(1, show.main().position());
    assert_eq!(200, transport.output(1, 1));
    assert_eq!(0, transport.output(1, 2));
    Ok(())
}

#[test]
fn test_insert_step_during_fade_keeps_target() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    show.record_cue(0.5, "inserted")?;
    show.import_main_playback(&[
        entry(1.0, &[(1, 255)], Timing::fade(1.0)),
        entry(2.0, &[(2, 255)], Timing::fade(1.0)),
    ])?;

    let start = Instant::now();
    assert!(show.do_go_at(start));
    show.insert_step(1, 0.5, None)?;
    show.tick(start + Duration::from_secs(2));

    assert!(!show.is_fading());
    assert_eq!(2, show.main().position());
    assert_eq!(1.0, show.main().current_step().cue().memory());
    assert_eq!(255, transport.output(1, 1));
    assert_eq!(
        Some(0.5),
        show.main().step(1).map(|step| step.cue().memory())
    );
    Ok(())
}

#[test]
fn test_merge_priority() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    show.import_main_playback(&[
        entry(1.0, &[(1, 50)], Timing::default()),
        entry(2.0, &[(1, 60)], Timing::fade(10.0)),
    ])?;
    let now = Instant::now();
    show.do_go_at(now);
    assert_eq!(50, transport.output(1, 1));

    show.set_channel_level(1, 100)?;
    show.set_fader_content(
        0,
        0,
        FaderSource::Channels {
            channels: levels(&[(1, 30)]),
        },
    )?;
    show.set_fader_level(0, 0, 1.0)?;
    show.add_independent(Independent::new(1, "work", levels(&[(1, 20)])))?;
    show.set_independent_level(1, 255.0)?;
    assert_eq!(100, transport.output(1, 1));
    assert_eq!(100, show.output_level(1)?);

    show.clear_channel_level(1)?;
    assert_eq!(50, transport.output(1, 1));

    show.set_fader_content(
        0,
        0,
        FaderSource::Channels {
            channels: levels(&[(1, 200)]),
        },
    )?;
    assert_eq!(50, transport.output(1, 1));
    show.set_fader_level(0, 0, 1.0)?;
    assert_eq!(200, transport.output(1, 1));
    show.set_fader_level(0, 0, 0.0)?;

    // User levels set while a Go is fading do not override the sequence.
    show.do_go_at(now);
    show.set_channel_level(1, 255)?;
    assert_eq!(50, transport.output(1, 1));
    Ok(())
}

#[test]
fn test_main_fader_scales_main_playback() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    show.import_main_playback(&[entry(1.0, &[(1, 255), (2, 100)], Timing::default())])?;
    show.do_go();
    show.set_fader_content(1, 0, FaderSource::Main)?;
    assert_eq!(255, transport.output(1, 1));

    show.set_fader_level(1, 0, 0.5)?;
    assert_eq!(128, transport.output(1, 1));
    assert_eq!(50, transport.output(1, 2));

    // Independents are not scaled by the main fader.
    show.add_independent(Independent::new(2, "", levels(&[(2, 255)])))?;
    show.set_independent_level(2, 255.0)?;
    assert_eq!(255, transport.output(1, 2));
    Ok(())
}

#[test]
fn test_channel_levels() -> Result<(), ShowError> {
    let (mut show, _) = show();
    show.import_main_playback(&[
        entry(1.0, &[(1, 100)], Timing::default()),
        entry(2.0, &[(1, 200)], Timing::fade(2.0)),
    ])?;
    let start = Instant::now();
    show.do_go_at(start);
    assert_eq!((100, 200), show.channel_levels(1)?);

    show.do_go_at(start);
    show.tick(start + Duration::from_secs(1));
    assert_eq!((150, 200), show.channel_levels(1)?);
    assert_eq!(Err(ShowError::InvalidChannel(0)), show.channel_levels(0));

    assert_eq!("150", show.display_level(150));
    Ok(())
}

#[test]
fn test_record_and_update_cue() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    show.set_channel_level(1, 100)?;
    show.set_channel_level(2, 50)?;
    show.set_channel_level(3, 0)?;
    // Faders are not recorded.
    show.set_fader_content(
        0,
        1,
        FaderSource::Channels {
            channels: levels(&[(9, 255)]),
        },
    )?;
    show.set_fader_level(0, 1, 1.0)?;

    let cue = show.record_cue(1.0, "warm")?;
    assert_eq!(&levels(&[(1, 100), (2, 50)]), cue.channels());
    assert_eq!(Err(ShowError::InvalidMemory(0.0)), show.record_cue(0.0, "").map(|_| ()));

    show.add_step(1.0, None)?;
    assert_eq!(5.0, show.main().step(1).map_or(0.0, |step| step.time_in()));
    show.set_fader_content(0, 0, FaderSource::Preset { memory: 1.0 })?;
    show.set_fader_level(0, 0, 1.0)?;

    show.set_channel_level(3, 200)?;
    let updated = show.update_cue(1.0)?;
    assert_eq!("warm", updated.text());
    assert_eq!(200, updated.level(3));
    assert_eq!(1, show.memories().len());
    assert_eq!(
        Some(200),
        show.main().step(1).map(|step| step.cue().level(3))
    );
    match show.faders().get(0, 0)?.content() {
        FaderContent::Preset(cue) => assert_eq!(200, cue.level(3)),
        _ => panic!("fader lost its preset"),
    }

    // The preset keeps channel 3 up once the user level is gone.
    show.clear_channel_level(3)?;
    assert_eq!(200, transport.output(1, 3));
    assert_eq!(Err(ShowError::UnknownCue(9.0)), show.update_cue(9.0).map(|_| ()));
    Ok(())
}

#[test]
fn test_step_editing() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    show.set_channel_level(1, 255)?;
    show.set_channel_level(2, 255)?;
    show.record_cue(1.0, "")?;
    show.clear_user_levels();
    show.add_step(
        1.0,
        Some(Timing {
            time_in: 5.0,
            time_out: 3.0,
            wait: 1.0,
            ..Default::default()
        }),
    )?;
    assert_eq!(6.0, show.main().step(1).map_or(0.0, |step| step.total_time()));

    show.set_step_timing(1, Timing::fade(4.0))?;
    show.set_channel_time(1, 2, 0.0, 1.0)?;
    assert_eq!(4.0, show.main().step(1).map_or(0.0, |step| step.total_time()));
    assert_eq!(Err(ShowError::UnknownStep(0)), show.set_step_timing(0, Timing::default()));
    assert_eq!(Err(ShowError::UnknownStep(2)), show.set_step_timing(2, Timing::default()));

    let start = Instant::now();
    show.do_go_at(start);
    show.tick(start + Duration::from_secs(1));
    assert_eq!(255, transport.output(1, 2));
    assert_eq!(64, transport.output(1, 1));
    Ok(())
}

#[test]
fn test_curve_deletion_demotes_outputs() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    let id = show.add_curve(Curve::new("limit", CurveKind::Limit { limit: 127 }));
    assert_eq!(10, id);
    show.set_output_curve(1, 1, id)?;
    show.set_channel_level(1, 255)?;
    assert_eq!(127, transport.output(1, 1));

    show.del_curve(id)?;
    assert_eq!(255, transport.output(1, 1));
    assert_eq!(
        Some(LINEAR_CURVE),
        show.patch()
            .binding(Address::new(1, 1))
            .map(|binding| binding.curve)
    );
    assert_eq!(Err(ShowError::ReservedCurve(0)), show.del_curve(0));
    assert_eq!(Err(ShowError::UnknownCurve(11)), show.set_output_curve(1, 1, 11));
    Ok(())
}

#[test]
fn test_edited_curve_reaches_outputs() -> Result<(), ShowError> {
    let (mut show, transport) = show();
    let id = show.add_curve(Curve::new("limit", CurveKind::Limit { limit: 200 }));
    show.set_output_curve(1, 1, id)?;
    show.set_channel_level(1, 255)?;
    assert_eq!(200, transport.output(1, 1));

    show.curve_mut(id).ok_or(ShowError::UnknownCurve(id))?.set_limit(100)?;
    show.refresh_outputs();
    assert_eq!(100, transport.output(1, 1));
    Ok(())
}

#[test]
fn test_rejected_patch_import_is_not_applied() {
    let (mut show, transport) = show();
    let result = show.import_patch(&[
        PatchEntry {
            channel: 1,
            universe: 1,
            output: 10,
            curve: 0,
        },
        PatchEntry {
            channel: 2,
            universe: 9,
            output: 1,
            curve: 0,
        },
    ]);
    assert_eq!(Err(ShowError::InvalidUniverse(9)), result);
    assert_eq!(Some(5), show.patch().channel_of(5, 1));
    assert_eq!(Some(10), show.patch().channel_of(10, 1));

    assert_eq!(
        Err(ShowError::InvalidOutput(513)),
        show.patch_output(1, 513, 1, 0)
    );

    show.set_channel_level(7, 77).unwrap();
    show.unpatch_output(7, 1);
    assert_eq!(0, transport.output(1, 7));
    show.patch_output(7, 8, 1, 0).unwrap();
    assert_eq!(77, transport.output(1, 8));
    show.patch_empty();
    assert_eq!(0, transport.output(1, 8));
}

#[test]
fn test_chaser_fader() -> Result<(), ShowError> {
    let transport = Arc::new(MockTransport::new());
    let mut show = LightShow::new(ShowSettings::default(), transport.clone());
    show.patch_1on1();
    show.set_channel_level(3, 255)?;
    show.record_cue(1.0, "")?;
    show.clear_user_levels();
    show.set_channel_level(4, 255)?;
    show.record_cue(2.0, "")?;
    show.clear_user_levels();

    let timing = Timing {
        time_in: 0.02,
        time_out: 0.02,
        wait: 0.05,
        ..Default::default()
    };
    show.add_chaser(1, "chase");
    show.add_chaser_step(1, 1.0, Some(timing))?;
    show.add_chaser_step(1, 2.0, Some(timing))?;
    assert_eq!(
        Err(ShowError::UnknownChaser(2)),
        show.add_chaser_step(2, 1.0, None)
    );

    show.set_fader_content(0, 0, FaderSource::Sequence { chaser: 1 })?;
    show.set_fader_level(0, 0, 1.0)?;
    assert!(show.faders().get(0, 0)?.is_running());

    let show = Mutex::new(show);
    eventually(
        || {
            show.lock().tick(Instant::now());
            transport.output(1, 3) == 255
        },
        "Chaser never brought channel 3 up",
    );
    eventually(
        || {
            show.lock().tick(Instant::now());
            transport.output(1, 4) == 255
        },
        "Chaser never brought channel 4 up",
    );

    let mut show = show.into_inner();
    show.set_fader_level(0, 0, 0.0)?;
    assert!(!show.faders().get(0, 0)?.is_running());
    show.tick(Instant::now());
    assert_eq!(0, transport.output(1, 3));
    assert_eq!(0, transport.output(1, 4));
    Ok(())
}

#[test]
fn test_import_rejects_dangling_references() {
    let (mut show, _) = show();
    show.set_channel_level(1, 255).unwrap();
    show.record_cue(1.0, "keep").unwrap();

    let file = ShowFile {
        faders: vec![crate::config::show::FaderEntry {
            page: 0,
            index: 0,
            level: 1.0,
            content: FaderSource::Preset { memory: 4.0 },
        }],
        ..Default::default()
    };
    assert_eq!(Err(ShowError::UnknownCue(4.0)), show.import(&file));
    assert!(show.cue(1.0).is_some());

    let file = ShowFile {
        chasers: vec![ChaserEntry {
            index: 1,
            text: String::new(),
            steps: vec![entry(1.0, &[(2000, 1)], Timing::default())],
        }],
        ..Default::default()
    };
    assert_eq!(Err(ShowError::InvalidChannel(2000)), show.import(&file));
}

#[test]
fn test_export_import_round_trip() -> Result<(), Box<dyn Error>> {
    let (mut show, _) = show();
    let curve = show.add_curve(Curve::new(
        "soft",
        CurveKind::Interpolate {
            points: BTreeMap::from([(64, 20), (192, 220)]),
        },
    ));
    show.patch_output(1, 20, 1, curve)?;
    show.unpatch_output(2, 1);

    let mut fade = entry(1.0, &[(1, 255), (3, 10)], Timing::fade(3.0));
    fade.channel_time.insert(3, ChannelTime::new(1.0, 0.5));
    show.import_main_playback(&[
        fade,
        entry(
            2.5,
            &[(2, 128)],
            Timing {
                time_in: 1.0,
                time_out: 2.0,
                delay_in: 0.5,
                delay_out: 0.25,
                wait: 4.0,
            },
        ),
    ])?;
    show.set_channel_level(5, 90)?;
    show.record_cue(7.0, "spare")?;
    show.clear_user_levels();
    show.import_chaser(&ChaserEntry {
        index: 3,
        text: "chase".to_string(),
        steps: vec![entry(8.0, &[(9, 255)], Timing::fade(0.5))],
    })?;
    show.add_group(Group::new(1.5, "front", levels(&[(4, 200)])))?;
    show.set_fader_content(0, 0, FaderSource::Group { index: 1.5 })?;
    show.set_fader_level(0, 0, 0.5)?;
    show.set_fader_content(0, 1, FaderSource::Main)?;
    show.set_fader_level(0, 1, 0.75)?;
    show.set_fader_content(1, 2, FaderSource::Preset { memory: 7.0 })?;
    show.set_fader_content(1, 3, FaderSource::Sequence { chaser: 3 })?;
    show.add_independent(Independent::new(4, "house", levels(&[(11, 255)])))?;
    show.set_independent_level(4, 100.0)?;

    let exported = show.export();
    assert_eq!(1, exported.curves.len());
    assert_eq!(4, exported.faders.len());
    assert_eq!(2, exported.main_playback.len());

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("show.json");
    exported.save(&path)?;

    let (mut loaded, transport) = {
        let transport = Arc::new(MockTransport::new());
        (
            LightShow::new(ShowSettings::default(), transport.clone()),
            transport,
        )
    };
    loaded.import(&ShowFile::load(&path)?)?;
    assert_eq!(exported, loaded.export());
    assert_eq!(Some(1), loaded.patch().channel_of(20, 1));
    assert_eq!(None, loaded.patch().channel_of(2, 1));

    // Channel 4 from the group fader at half.
    assert_eq!(100, transport.output(1, 4));
    Ok(())
}
