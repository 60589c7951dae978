mod common;

use core::iter::repeat;
use evespi::{
    host::*,
    registers::RegisterMap,
    sim::*,
    };
use common::*;


const LOST: u32 = 0x0000_0000;
const PARTIAL: u32 = 0x7fff_ffff;

async fn supervised(chip: &SimChip) -> (Transport<SimBus, SimSelect>, LinkSupervisor) {
    let transport = Transport::new(chip.bus(), chip.select()).unwrap();
    let link = LinkSupervisor::start(&transport, RegisterMap::BT820, LinkConfig::default()).await.unwrap();
    (transport, link)
}

#[tokio::test]
async fn start_sets_capture_up() {
    logging();
    let chip = SimChip::running(SimConfig::default());
    let registers = RegisterMap::BT820;
    let (_transport, link) = supervised(&chip).await;

    assert_eq!(link.state(), LinkState::Synced);
    assert_eq!(chip.writes_to(registers.rx_setup), [1]);
    assert_eq!(chip.writes_to(registers.rx_dest), [0x10_0000]);
    assert_eq!(chip.writes_to(registers.rx_format), [7]);
    assert_eq!(chip.writes_to(registers.rx_dither), [1]);
    assert_eq!(chip.writes_to(registers.rx_capture), [1]);
    assert_eq!(chip.writes_to(registers.rx_enable), [1]);
    assert_eq!(chip.writes_to(registers.link_setup), [0x16]);
    assert_eq!(chip.writes_to(registers.link_control), [0x8989]);
}

#[tokio::test]
async fn steady_link_is_left_alone() {
    logging();
    let chip = SimChip::running(SimConfig::default());
    let (transport, mut link) = supervised(&chip).await;
    chip.clear_log();

    for _ in 0 .. 20 {
        assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Steady);
    }
    assert!(chip.writes_to(RegisterMap::BT820.rx_setup).is_empty());
    assert!(chip.writes_to(RegisterMap::BT820.rx_capture).is_empty());
}

#[tokio::test]
async fn loss_is_debounced() {
    logging();
    let chip = SimChip::running(SimConfig::default());
    let registers = RegisterMap::BT820;
    let (transport, mut link) = supervised(&chip).await;
    chip.clear_log();

    // a partially synchronized link is as bad as no link
    chip.script_link([PARTIAL].into_iter().chain(repeat(LOST).take(11)));
    for count in 1 .. 10 {
        assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Glitch(count));
        assert_eq!(link.state(), LinkState::Degrading(count));
    }
    assert!(chip.writes_to(registers.rx_capture).is_empty());
    assert!(chip.writes_to(registers.link_control).is_empty());

    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Lost);
    assert_eq!(link.state(), LinkState::Lost);
    assert_eq!(chip.writes_to(registers.rx_capture), [0]);
    assert_eq!(chip.writes_to(registers.rx_enable), [0]);
    assert_eq!(chip.writes_to(registers.link_control), [0x8888]);

    // capture stays disabled without touching the chip again
    for _ in 0 .. 2 {
        assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Down);
    }
    assert_eq!(chip.writes_to(registers.rx_capture), [0]);
    assert_eq!(chip.writes_to(registers.link_control), [0x8888]);

    // script exhausted, the link is back
    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Recovered);
    assert_eq!(link.state(), LinkState::Synced);
    assert_eq!(chip.writes_to(registers.rx_setup), [1]);
    assert_eq!(chip.writes_to(registers.rx_capture), [0, 1]);
    assert_eq!(chip.writes_to(registers.link_control), [0x8888, 0x8989]);

    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Steady);
    assert_eq!(chip.writes_to(registers.rx_setup), [1]);
}

#[tokio::test]
async fn glitch_below_threshold_recovers() {
    logging();
    let chip = SimChip::running(SimConfig::default());
    let registers = RegisterMap::BT820;
    let (transport, mut link) = supervised(&chip).await;
    chip.clear_log();

    chip.script_link(repeat(LOST).take(9));
    for _ in 0 .. 9 {
        link.poll(&transport).await.unwrap();
    }
    assert_eq!(link.state(), LinkState::Degrading(9));
    assert!(chip.writes_to(registers.rx_enable).is_empty());

    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Recovered);
    assert_eq!(link.state(), LinkState::Synced);
    // capture was never disabled, setup is only issued again
    assert_eq!(chip.writes_to(registers.rx_enable), [1]);
    assert!(chip.writes_to(registers.link_control).iter().all(|&control| control == 0x8989));

    // the count restarts from scratch
    chip.script_link(repeat(LOST).take(9));
    for count in 1 .. 10 {
        assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Glitch(count));
    }
}

#[tokio::test]
async fn threshold_is_configurable() {
    logging();
    let chip = SimChip::running(SimConfig::default());
    let transport = Transport::new(chip.bus(), chip.select()).unwrap();
    let config = LinkConfig {threshold: 2, .. Default::default()};
    let mut link = LinkSupervisor::start(&transport, RegisterMap::BT820, config).await.unwrap();

    chip.script_link([LOST, LOST]);
    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Glitch(1));
    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Lost);
}

#[tokio::test]
async fn neighbour_reads_leave_statuses_to_polls() {
    logging();
    let chip = SimChip::running(SimConfig::default());
    let registers = RegisterMap::BT820;
    let (transport, mut link) = supervised(&chip).await;

    chip.script_link([LOST, LOST]);
    // these registers sit right before the status, their reads run past it
    assert_eq!(transport.read(registers.link_control).await.unwrap(), 0x8989);
    assert_eq!(transport.read(registers.link_setup).await.unwrap(), 0x16);
    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Glitch(1));
    transport.read(registers.link_control).await.unwrap();
    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Glitch(2));
    assert_eq!(link.poll(&transport).await.unwrap(), LinkEvent::Recovered);
}
