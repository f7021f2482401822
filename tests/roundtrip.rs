extern crate ir_remote;

use ir_remote::eeprom::{
	CodeBank,
	Eeprom24c,
	SimulatedEeprom,
	EEPROM_SIZE,
};
use ir_remote::hardware::SimulatedHardware;
use ir_remote::ir::nec::{
	self,
	NecCommand,
	NecFrame,
	NecTiming,
};
use ir_remote::{
	IrConfig,
	IrDriver,
	IrError,
	Level,
	Pulse,
	PulseSequence,
};

fn config() -> IrConfig {
	IrConfig {
		trim_us: 0,
		..IrConfig::default()
	}
}

fn driver() -> IrDriver<SimulatedHardware> {
	let config = config();
	let mut driver = IrDriver::new(SimulatedHardware::new(&config), config);
	driver.init_ir().unwrap();
	driver
}

#[test]
fn nec_command_is_decodable() {
	let mut driver = driver();
	driver.send_nec_command(0x04, 0xc5).unwrap();
	let emitted = driver.hardware().emitted();
	let timing = NecTiming::for_config(&config());
	assert_eq!(nec::decode(emitted.pulses(), &timing), Ok(NecFrame::Command(NecCommand::new(0x04, 0xc5))));
}

#[test]
fn learned_code_survives_code_bank() {
	let config = config();
	let timing = NecTiming::for_config(&config);
	let frame = nec::encode(&NecCommand::new(0x20, 0x0b), &timing).unwrap();

	let mut driver = driver();
	driver.hardware().feed(500, frame.pulses());
	let learned = driver.learn_ir().unwrap();

	let mut bank = CodeBank::new(
		Eeprom24c::new(SimulatedEeprom::new(EEPROM_SIZE)),
		EEPROM_SIZE,
		config.wire_unit_ticks(),
	);
	bank.store(7, &learned).unwrap();
	let stored = bank.load(7).unwrap().unwrap();
	// 100 µs resolution
	assert_eq!(stored.len(), learned.len());

	driver.hardware().clear_trace();
	driver.send_sequence(&stored).unwrap();
	let replayed = driver.hardware().emitted();
	assert_eq!(nec::decode(replayed.pulses(), &timing), Ok(NecFrame::Command(NecCommand::new(0x20, 0x0b))));
}

#[test]
fn oversized_sequences_are_rejected() {
	let mut driver = driver();
	let mut seq = PulseSequence::new();
	for _ in 0..(config().max_pulses / 2 + 1) {
		seq.push_mark_space(10, 10).unwrap();
	}
	assert_eq!(driver.send_sequence(&seq), Err(IrError::SigTooLong));
	assert!(driver.hardware().emitted().is_empty());
}

#[test]
fn driver_needs_init() {
	let config = config();
	let mut driver = IrDriver::new(SimulatedHardware::new(&config), config);
	assert_eq!(driver.send_pulse(Level::High, 10), Err(IrError::NotInitialized));
	driver.init_ir().unwrap();
	driver.send_pulse(Level::High, 10).unwrap();
	assert_eq!(driver.hardware().emitted().pulses(), &[Pulse::mark(10)]);
}

#[test]
fn silence_times_out() {
	let mut driver = driver();
	assert_eq!(driver.learn_ir(), Err(IrError::NoSignal));
}
