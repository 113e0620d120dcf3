//! Print accelerometer and gyro readings from a 3DM-GX4 for ten seconds.
//!
//! ```text
//! cargo run -p gx4 --example read-imu -- /dev/ttyACM0
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use gx4::session::{ImuData, ImuFields};
use gx4::Device;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyACM0".to_string());

    let mut imu = Device::open(&path, 115_200)?;
    let selection = imu.select_baud_rate(921_600)?;
    println!("device was at {} baud, now {}", selection.discovered, selection.selected);

    imu.idle()?;
    let info = imu.device_info()?;
    println!("{} serial {}", info.model_name, info.serial_number);

    let base_rate = imu.imu_base_rate()?;
    imu.set_imu_data_rate((base_rate / 100).max(1), ImuFields::ACCELEROMETER | ImuFields::GYROSCOPE)?;

    let observer = Arc::new(|data: &ImuData| {
        if let (Some(accel), Some(gyro)) = (data.accel(), data.gyro()) {
            println!("accel {accel:?} gyro {gyro:?}");
        }
    });
    imu.set_imu_observer(&observer);
    imu.enable_imu_stream(true)?;
    imu.resume()?;

    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(10) {
        imu.run_once(Duration::from_millis(100))?;
    }

    imu.disconnect();
    Ok(())
}
