#![no_std]
// BlueRelay - UART Bluetooth Bridge
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![no_main]

use panic_halt as _;

use bluerelay_core::{Channel, LineRelay, PolledChannel, RelayConfig, TxWait};
use cortex_m::peripheral::NVIC;
use cortex_m_rt::entry;
use stm32f1xx_hal::{
    pac::{self, interrupt},
    prelude::*,
    serial::{Config, Event, Serial},
};

mod ports;

use ports::{HostPort, ModulePort};

const HOST_BAUD: u32 = 9600;
/// HC-05 AT-command mode rate.
const MODULE_BAUD: u32 = 38400;

#[entry]
fn main() -> ! {
    let dp = pac::Peripherals::take().unwrap();
    let mut cp = cortex_m::Peripherals::take().unwrap();

    let mut rcc = dp.RCC.constrain();
    let mut flash = dp.FLASH.constrain();
    let clocks = rcc.cfgr.freeze(&mut flash.acr);

    let mut afio = dp.AFIO.constrain();
    let mut gpioa = dp.GPIOA.split();

    // USART1: TX on PA9, RX on PA10
    let host_tx = gpioa.pa9.into_alternate_push_pull(&mut gpioa.crh);
    let host_rx = gpioa.pa10;
    let mut host = Serial::new(
        dp.USART1,
        (host_tx, host_rx),
        &mut afio.mapr,
        Config::default().baudrate(HOST_BAUD.bps()),
        &clocks,
    );

    // USART2: TX on PA2, RX on PA3
    let module_tx = gpioa.pa2.into_alternate_push_pull(&mut gpioa.crl);
    let module_rx = gpioa.pa3;
    let mut module = Serial::new(
        dp.USART2,
        (module_tx, module_rx),
        &mut afio.mapr,
        Config::default().baudrate(MODULE_BAUD.bps()),
        &clocks,
    );

    host.listen(Event::Rxne);
    module.listen(Event::Rxne);

    // Same priority for both: neither handler can preempt the other while it
    // is writing to the peer's data register.
    unsafe {
        cp.NVIC.set_priority(pac::Interrupt::USART1, 1 << 4);
        cp.NVIC.set_priority(pac::Interrupt::USART2, 1 << 4);
        NVIC::unmask(pac::Interrupt::USART1);
        NVIC::unmask(pac::Interrupt::USART2);
    }

    cp.SCB.set_sleeponexit();
    loop {
        cortex_m::asm::wfi();
    }
}

#[interrupt]
fn USART1() {
    static mut RELAY: LineRelay = LineRelay::with_config(RelayConfig::host());

    let mut own = PolledChannel::new(HostPort, TxWait::Unbounded);
    let mut peer = PolledChannel::new(ModulePort, TxWait::Unbounded);
    while let Some(byte) = own.receive_byte() {
        // Overflows are already resolved by the relay; nowhere to report them.
        let _ = RELAY.on_byte(byte, &mut own, &mut peer);
    }
}

#[interrupt]
fn USART2() {
    static mut RELAY: LineRelay = LineRelay::with_config(RelayConfig::module());

    let mut own = PolledChannel::new(ModulePort, TxWait::Unbounded);
    let mut peer = PolledChannel::new(HostPort, TxWait::Unbounded);
    while let Some(byte) = own.receive_byte() {
        let _ = RELAY.on_byte(byte, &mut own, &mut peer);
    }
}
