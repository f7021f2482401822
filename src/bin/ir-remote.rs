#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate ir_remote;
use ir_remote::*;

use std::process::exit;

use ir_remote::config::consts;
use ir_remote::eeprom::{
	CodeBank,
	Eeprom24c,
	I2cBus,
	SimulatedEeprom,
	EEPROM_SIZE,
};
use ir_remote::hardware::{
	Hardware,
	SimulatedHardware,
};
use ir_remote::ir::nec::{
	self,
	NecCommand,
	NecFrame,
};
use ir_remote::pulse::{
	format_hex,
	parse_hex,
};

const DEFAULT_DEVICE: &str = "/dev/uio0";
const DEFAULT_I2C_BUS: &str = "/dev/i2c-1";

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_param_or<T>(matches: &clap::ArgMatches, name: &str, default: T) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	if matches.is_present(name) {
		get_param(matches, name)
	} else {
		Ok(default)
	}
}

// decimal or 0x prefixed hex
fn get_number(matches: &clap::ArgMatches, name: &str, max: u32) -> AResult<u32> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	let value = if param.starts_with("0x") || param.starts_with("0X") {
		u32::from_str_radix(&param[2..], 16)
	} else {
		param.parse::<u32>()
	};
	let value = value.map_err(|e| format_err!("invalid parameter {}: {}", name, e))?;
	ensure!(value <= max, "parameter {} out of range: {} > {}", name, value, max);
	Ok(value)
}

fn build_config(matches: &clap::ArgMatches) -> AResult<IrConfig> {
	let mut config = IrConfig::default();
	config.trim_us = get_param_or(matches, "trim", config.trim_us)?;
	if matches.is_present("clock") || matches.is_present("carrier") || matches.is_present("duty") {
		let clock = get_param_or(matches, "clock", config.clock_hz)?;
		let carrier = get_param_or(matches, "carrier", consts::CARRIER_HZ)?;
		let duty = get_param_or(matches, "duty", consts::CARRIER_DUTY)?;
		config = config.with_clock(clock, carrier, duty)?;
	}
	config.validate()?;
	Ok(config)
}

fn open_bank(matches: &clap::ArgMatches, simulate: bool, config: &IrConfig) -> AResult<CodeBank<Box<dyn I2cBus>>> {
	let bus: Box<dyn I2cBus> = match matches.value_of("eeprom") {
		None if simulate => {
			info!("using simulated EEPROM, contents are lost on exit");
			Box::new(SimulatedEeprom::new(EEPROM_SIZE))
		},
		path => Box::new(eeprom::open_i2c_bus(path.unwrap_or(DEFAULT_I2C_BUS))?),
	};
	Ok(CodeBank::new(Eeprom24c::new(bus), EEPROM_SIZE, config.wire_unit_ticks()))
}

fn print_code(code: &PulseSequence, config: &IrConfig) {
	println!("{}", code);
	match code.to_wire(config.wire_unit_ticks()) {
		Ok(wire) => println!("{}", format_hex(&wire)),
		Err(e) => warn!("code can't be stored: {}", e),
	}
	match nec::decode(code.pulses(), &nec::NecTiming::for_config(config)) {
		Ok(NecFrame::Command(command)) => println!("{}", command),
		Ok(NecFrame::Repeat) => println!("NEC repeat"),
		Err(e) => debug!("not a NEC frame: {}", e),
	}
}

fn show_timer(config: &IrConfig) -> AResult<()> {
	let prescaler = config.carrier.validate()?;
	println!("carrier: {} Hz, duty {}% (prescaler {}, OCR0A {}, OCR0B {})",
		config.carrier.carrier_hz(config.clock_hz),
		config.carrier.duty_percent(),
		prescaler,
		config.carrier.ocr_a,
		config.carrier.ocr_b,
	);
	let prescaler = config.tick.validate(config.clock_hz, config.tick_us)?;
	println!("tick: {} ns (prescaler {}, OCR0A {})", config.tick.tick_ns(config.clock_hz), prescaler, config.tick.ocr);
	println!("trim: {} µs ({} ticks)", config.trim_us, config.trim_ticks());
	println!("learning: idle timeout {} ticks, max pulse {} ticks, max {} pulses",
		config.idle_timeout_ticks(),
		config.max_pulse_ticks,
		config.max_pulses,
	);
	Ok(())
}

fn store(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches, simulate: bool, config: &IrConfig) -> AResult<()> {
	let slot: usize = get_param(sub_m, "SLOT")?;
	let wire = parse_hex(sub_m.value_of("CODE").unwrap_or(""))?;
	let code = PulseSequence::from_wire(&wire, config.wire_unit_ticks())?;
	let mut bank = open_bank(matches, simulate, config)?;
	bank.store(slot, &code)?;
	info!("stored {} pulses in slot {}", code.len(), slot);
	Ok(())
}

fn list(matches: &clap::ArgMatches, simulate: bool, config: &IrConfig) -> AResult<()> {
	let mut bank = open_bank(matches, simulate, config)?;
	for (slot, code) in bank.list()? {
		println!("slot {}:", slot);
		print_code(&code, config);
	}
	Ok(())
}

fn erase(matches: &clap::ArgMatches, sub_m: &clap::ArgMatches, simulate: bool, config: &IrConfig) -> AResult<()> {
	let slot: usize = get_param(sub_m, "SLOT")?;
	let mut bank = open_bank(matches, simulate, config)?;
	bank.erase(slot)?;
	info!("erased slot {}", slot);
	Ok(())
}

fn send_nec<H: Hardware>(driver: &mut IrDriver<H>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address = get_number(sub_m, "ADDRESS", 0xffff)?;
	let command = get_number(sub_m, "COMMAND", 0xff)? as u8;
	let repeats: usize = get_param_or(sub_m, "repeat", 0)?;
	let command = if address > 0xff {
		NecCommand::extended(address as u16, command)
	} else {
		NecCommand::new(address as u8, command)
	};
	driver.send_nec_held(&command, repeats)?;
	info!("sent {}", command);
	Ok(())
}

fn send_code<H: Hardware>(driver: &mut IrDriver<H>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let wire = parse_hex(sub_m.value_of("CODE").unwrap_or(""))?;
	let code = PulseSequence::from_wire(&wire, driver.config().wire_unit_ticks())?;
	driver.send_sequence(&code)?;
	info!("sent {} pulses", code.len());
	Ok(())
}

fn learn<H: Hardware>(driver: &mut IrDriver<H>, matches: &clap::ArgMatches, sub_m: &clap::ArgMatches, simulate: bool) -> AResult<()> {
	// check the slot before waiting for a signal
	let slot: Option<usize> = if sub_m.is_present("slot") {
		Some(get_param(sub_m, "slot")?)
	} else {
		None
	};
	info!("waiting for IR signal");
	let code = driver.learn_ir()?;
	let config = *driver.config();
	print_code(&code, &config);
	if let Some(slot) = slot {
		let mut bank = open_bank(matches, simulate, &config)?;
		bank.store(slot, &code)?;
		info!("stored in slot {}", slot);
	}
	Ok(())
}

fn replay<H: Hardware>(driver: &mut IrDriver<H>, matches: &clap::ArgMatches, sub_m: &clap::ArgMatches, simulate: bool) -> AResult<()> {
	let slot: usize = get_param(sub_m, "SLOT")?;
	let config = *driver.config();
	let mut bank = open_bank(matches, simulate, &config)?;
	let code = match bank.load(slot)? {
		Some(code) => code,
		None => bail!("slot {} is empty", slot),
	};
	driver.send_sequence(&code)?;
	info!("replayed slot {} ({} pulses)", slot, code.len());
	Ok(())
}

fn run_command<H: Hardware>(driver: &mut IrDriver<H>, matches: &clap::ArgMatches, simulate: bool) -> AResult<()> {
	driver.init_ir()?;
	match matches.subcommand() {
		("send_nec", Some(sub_m)) => {
			send_nec(driver, sub_m)
		},
		("send", Some(sub_m)) => {
			send_code(driver, sub_m)
		},
		("learn", Some(sub_m)) => {
			learn(driver, matches, sub_m, simulate)
		},
		("replay", Some(sub_m)) => {
			replay(driver, matches, sub_m, simulate)
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg device: -d --device +takes_value conflicts_with[simulate] "register window to use (UIO device or /dev/mem; default /dev/uio0)")
		(@arg simulate: -s --simulate "use simulated hardware and print the emitted pulses")
		(@arg eeprom: -e --eeprom +takes_value "I2C adapter with the code bank EEPROM (default /dev/i2c-1)")
		(@arg clock: --clock +takes_value "CPU clock in Hz")
		(@arg carrier: --carrier +takes_value "carrier frequency in Hz")
		(@arg duty: --duty +takes_value "carrier duty cycle in percent")
		(@arg trim: --trim +takes_value "shorten each pulse by this many µs")
		(@subcommand timer =>
			(about: "show timer configuration")
		)
		(@subcommand send_nec =>
			(about: "send NEC command")
			(@arg repeat: -r --repeat +takes_value "number of repeat frames (button held)")
			(@arg ADDRESS: +required "address (8 bit, or 16 bit for extended NEC)")
			(@arg COMMAND: +required "command byte")
		)
		(@subcommand send =>
			(about: "send code in wire format")
			(@arg CODE: +required "hex encoded (on, off) pairs in 100 µs units")
		)
		(@subcommand learn =>
			(about: "record code from the IR sensor")
			(@arg slot: --slot +takes_value "store code in code bank slot")
		)
		(@subcommand replay =>
			(about: "send code from code bank")
			(@arg SLOT: +required "code bank slot")
		)
		(@subcommand store =>
			(about: "store code in code bank")
			(@arg SLOT: +required "code bank slot")
			(@arg CODE: +required "hex encoded (on, off) pairs in 100 µs units")
		)
		(@subcommand list =>
			(about: "list codes in code bank")
		)
		(@subcommand erase =>
			(about: "erase code bank slot")
			(@arg SLOT: +required "code bank slot")
		)
	).get_matches();

	let config = build_config(&matches)?;
	let simulate = matches.is_present("simulate");

	match matches.subcommand() {
		("timer", _) => return show_timer(&config),
		("store", Some(sub_m)) => return store(&matches, sub_m, simulate, &config),
		("list", _) => return list(&matches, simulate, &config),
		("erase", Some(sub_m)) => return erase(&matches, sub_m, simulate, &config),
		_ => (),
	}

	if simulate {
		let mut hw = SimulatedHardware::new(&config);
		// give `learn` something to record
		let sample = nec::encode(&NecCommand::new(0x04, 0xc5), &nec::NecTiming::for_config(&config))?;
		hw.feed(config.us_to_ticks(100_000) as u64, sample.pulses());

		let mut driver = IrDriver::new(hw, config);
		run_command(&mut driver, &matches, simulate)?;
		let emitted = driver.hardware().emitted();
		if !emitted.is_empty() {
			println!("emitted ({} µs ticks): {}", config.tick_us, emitted);
		}
	} else {
		let device = matches.value_of("device").unwrap_or(DEFAULT_DEVICE);
		let hw = hardware::open_register_window(device, config.tick_us)?;
		let mut driver = IrDriver::new(hw, config);
		run_command(&mut driver, &matches, simulate)?;
	}

	Ok(())
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
