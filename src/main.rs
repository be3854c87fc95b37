use num_complex::Complex64;
use std::sync::Arc;

use vnasweep::calibration::{ErrorTermCalibration, ErrorTerms};
use vnasweep::engine::{SweepEvent, SweepWorker};
use vnasweep::hal::mock::{FaultMode, SimulatedVna};
use vnasweep::hal::ValueKind;
use vnasweep::observability::SweepMonitor;
use vnasweep::sweep::{AcquisitionSettings, SweepMode, SweepPlan};

const MAX_POINTS: usize = 101;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("VNA Sweep Engine - Demo");
    println!("=======================\n");

    let plan = SweepPlan::for_instrument(1_000_000, 100_000_000, 3 * MAX_POINTS, MAX_POINTS)
        .with_mode(SweepMode::Average)
        .with_averages(5, 1);

    let vna = SimulatedVna::new(MAX_POINTS).with_noise(0.002, 7)?;
    // a flaky link in the middle segment exercises the retry path
    let (mid_start, _) = plan.index_range(1);
    vna.inject_fault(ValueKind::S11, Some(mid_start), 2, FaultMode::Implausible);

    // slight directivity error across the band
    let calibration = ErrorTermCalibration::new(
        "demo",
        vec![
            ErrorTerms {
                e00: Complex64::new(0.01, 0.0),
                ..ErrorTerms::identity(1_000_000)
            },
            ErrorTerms {
                e00: Complex64::new(0.02, -0.01),
                ..ErrorTerms::identity(100_000_000)
            },
        ],
    );

    let worker = SweepWorker::new(AcquisitionSettings::default());
    let mut handle = worker.start(plan, Arc::new(calibration), Box::new(vna))?;

    let events = handle.events();
    let outcome = handle.wait().await;

    for event in events.try_iter() {
        match event {
            SweepEvent::Updated { segment, progress } => println!("segment {} done ({}%)", segment, progress),
            SweepEvent::Finished(data) => {
                println!("\nSweep finished with {} points", data.len());
                for dp in data.s11.iter().step_by(50) {
                    println!(
                        "  {:>11} Hz  |Γ| = {:.4}  VSWR = {:.3}  Z = {:.2}",
                        dp.freq,
                        dp.z().norm(),
                        dp.vswr(),
                        dp.impedance(vnasweep::core::Z0)
                    );
                }
            }
            SweepEvent::Stopped => println!("Sweep stopped"),
            SweepEvent::Error(msg) => println!("Sweep failed: {}", msg),
        }
    }

    println!("\nOutcome: {:?}\n", outcome?);
    println!("{}", SweepMonitor::new(worker.metrics()).generate_report());

    Ok(())
}
