use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes};
use gx4_frame::descriptor::{base, device, BASE_COMMAND, DEVICE_COMMAND, FILTER_COMMAND};
use gx4_frame::find_field;
use gx4_session::{
    select_baud_rate_with_config, BaudConfig, BaudSelection, FilterFields, FilterObserver,
    ImuFields, ImuObserver, Result, Session, SessionConfig, SessionError, SessionStats,
};
use gx4_transport::ByteTransport;
use tracing::{debug, info, warn};

use crate::command;
use crate::info::{DeviceInfo, DiagnosticFields};

/// A 3DM-GX4 attached through a byte transport.
#[derive(Debug)]
pub struct Device<T> {
    session: Session<T>,
    baud: BaudConfig,
}

#[cfg(feature = "serial")]
impl Device<gx4_transport::SerialTransport> {
    /// Open a serial port at `baud_rate` with default session settings.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let transport = gx4_transport::SerialTransport::open(path, baud_rate)?;
        Ok(Self::new(transport))
    }
}

impl<T: ByteTransport> Device<T> {
    pub fn new(transport: T) -> Self {
        Self::from_session(Session::new(transport))
    }

    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self::from_session(Session::with_config(transport, config))
    }

    pub fn from_session(session: Session<T>) -> Self {
        Self {
            session,
            baud: BaudConfig::default(),
        }
    }

    /// Replace the settings used by [`select_baud_rate`](Self::select_baud_rate).
    pub fn set_baud_config(&mut self, baud: BaudConfig) {
        self.baud = baud;
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<T> {
        &mut self.session
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// Check that the device answers.
    pub fn ping(&mut self) -> Result<()> {
        self.execute(BASE_COMMAND, command::ping()?)
    }

    /// Stop all streams and wait for commands.
    pub fn idle(&mut self) -> Result<()> {
        self.execute(BASE_COMMAND, command::idle()?)
    }

    /// Return to the mode the device was in before [`idle`](Self::idle).
    pub fn resume(&mut self) -> Result<()> {
        self.execute(BASE_COMMAND, command::resume()?)
    }

    pub fn device_info(&mut self) -> Result<DeviceInfo> {
        let data = self.query(BASE_COMMAND, command::device_info()?, base::DEVICE_INFO_REPLY)?;
        DeviceInfo::parse(&data).ok_or(SessionError::MalformedReply {
            descriptor: BASE_COMMAND,
            field: base::DEVICE_INFO_REPLY,
        })
    }

    /// IMU data base rate in Hz.
    pub fn imu_base_rate(&mut self) -> Result<u16> {
        self.query_u16(command::imu_base_rate()?, device::IMU_BASE_RATE_REPLY)
    }

    /// Estimation filter data base rate in Hz.
    pub fn filter_base_rate(&mut self) -> Result<u16> {
        self.query_u16(command::filter_base_rate()?, device::FILTER_BASE_RATE_REPLY)
    }

    pub fn diagnostic_info(&mut self) -> Result<DiagnosticFields> {
        let data = self.query(
            DEVICE_COMMAND,
            command::diagnostic_info()?,
            device::DEVICE_STATUS_REPLY,
        )?;
        DiagnosticFields::parse(&data).ok_or(SessionError::MalformedReply {
            descriptor: DEVICE_COMMAND,
            field: device::DEVICE_STATUS_REPLY,
        })
    }

    /// Stream the `sources` IMU groups at `base rate / decimation`.
    pub fn set_imu_data_rate(&mut self, decimation: u16, sources: ImuFields) -> Result<()> {
        self.execute(DEVICE_COMMAND, command::imu_message_format(decimation, sources)?)
    }

    /// Stream the `sources` filter groups at `base rate / decimation`.
    pub fn set_filter_data_rate(&mut self, decimation: u16, sources: FilterFields) -> Result<()> {
        self.execute(
            DEVICE_COMMAND,
            command::filter_message_format(decimation, sources)?,
        )
    }

    /// Select the aiding measurements the filter uses.
    pub fn enable_measurements(&mut self, accel: bool, magnetometer: bool) -> Result<()> {
        self.execute(
            FILTER_COMMAND,
            command::enable_measurements(accel, magnetometer)?,
        )
    }

    pub fn enable_bias_estimation(&mut self, enabled: bool) -> Result<()> {
        self.execute(FILTER_COMMAND, command::bias_estimation(enabled)?)
    }

    /// Magnetometer hard-iron offset in gauss.
    pub fn set_hard_iron_offset(&mut self, offset: [f32; 3]) -> Result<()> {
        self.execute(FILTER_COMMAND, command::hard_iron_offset(offset)?)
    }

    /// Magnetometer soft-iron matrix, row-major. Identity by default.
    pub fn set_soft_iron_matrix(&mut self, matrix: [f32; 9]) -> Result<()> {
        self.execute(FILTER_COMMAND, command::soft_iron_matrix(matrix)?)
    }

    pub fn enable_imu_stream(&mut self, enabled: bool) -> Result<()> {
        self.execute(
            DEVICE_COMMAND,
            command::enable_stream(device::STREAM_IMU, enabled)?,
        )?;
        info!(enabled, "IMU stream toggled");
        Ok(())
    }

    pub fn enable_filter_stream(&mut self, enabled: bool) -> Result<()> {
        self.execute(
            DEVICE_COMMAND,
            command::enable_stream(device::STREAM_FILTER, enabled)?,
        )?;
        info!(enabled, "filter stream toggled");
        Ok(())
    }

    /// Timestamp data with GPS time. Needs a PPS signal on the device's GPIO.
    pub fn enable_gps_time_sync(&mut self, enabled: bool) -> Result<()> {
        self.execute(DEVICE_COMMAND, command::pps_source(enabled)?)
    }

    /// Tell the device the current GPS time. Call once per second.
    pub fn send_gps_time_update(&mut self, week: u32, second: u32) -> Result<()> {
        self.execute(
            BASE_COMMAND,
            command::gps_time_update(command::GPS_WEEK, week)?,
        )?;
        self.execute(
            BASE_COMMAND,
            command::gps_time_update(command::GPS_SECONDS, second)?,
        )
    }

    /// Discover the current baud rate and switch both sides to `target`.
    pub fn select_baud_rate(&mut self, target: u32) -> Result<BaudSelection> {
        select_baud_rate_with_config(&mut self.session, target, &self.baud)
    }

    /// Receive for up to `timeout` and deliver telemetry to the observers.
    pub fn run_once(&mut self, timeout: Duration) -> Result<usize> {
        self.session.run_once(timeout)
    }

    pub fn set_imu_observer<O: ImuObserver + 'static>(&mut self, observer: &Arc<O>) {
        self.session.set_imu_observer(observer);
    }

    pub fn set_filter_observer<O: FilterObserver + 'static>(&mut self, observer: &Arc<O>) {
        self.session.set_filter_observer(observer);
    }

    /// Put the device in idle and hand back the transport.
    ///
    /// A failed idle command is logged; the transport is returned regardless.
    pub fn disconnect(mut self) -> T {
        if let Err(err) = self.idle() {
            warn!(error = %err, "device did not acknowledge idle on disconnect");
        }
        self.session.into_inner()
    }

    fn execute(&mut self, descriptor: u8, payload: Bytes) -> Result<()> {
        let timeout = self.session.config().command_timeout;
        self.session.send_command(descriptor, &payload, timeout)?;
        Ok(())
    }

    /// Send a command and return the data of reply field `reply_field`.
    fn query(&mut self, descriptor: u8, payload: Bytes, reply_field: u8) -> Result<Bytes> {
        let timeout = self.session.config().command_timeout;
        let reply = self.session.send_command(descriptor, &payload, timeout)?;
        match find_field(&reply.payload, reply_field) {
            Ok(Some(field)) => Ok(reply.payload.slice_ref(field.data)),
            Ok(None) | Err(_) => {
                debug!(%reply, reply_field, "reply lacks expected field");
                Err(SessionError::MalformedReply {
                    descriptor,
                    field: reply_field,
                })
            }
        }
    }

    fn query_u16(&mut self, payload: Bytes, reply_field: u8) -> Result<u16> {
        let mut data = self.query(DEVICE_COMMAND, payload, reply_field)?;
        if data.remaining() < 2 {
            return Err(SessionError::MalformedReply {
                descriptor: DEVICE_COMMAND,
                field: reply_field,
            });
        }
        Ok(data.get_u16())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::BufMut;
    use gx4_frame::descriptor::{filter, FUNCTION_APPLY, IMU_DATA};
    use gx4_session::testing::SimulatedDevice;
    use gx4_session::ImuData;

    use super::*;
    use crate::info::fixtures::{device_info_data, diagnostic_data};

    fn attach(sim: SimulatedDevice) -> Device<SimulatedDevice> {
        let config = SessionConfig {
            command_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        };
        Device::with_config(sim, config)
    }

    fn sent(gx4: &Device<SimulatedDevice>) -> Vec<(u8, Vec<u8>)> {
        gx4.session()
            .transport()
            .commands()
            .iter()
            .map(|frame| (frame.descriptor, frame.payload.to_vec()))
            .collect()
    }

    #[test]
    fn ping_idle_resume() {
        let mut gx4 = attach(SimulatedDevice::new(115_200));
        gx4.ping().unwrap();
        gx4.idle().unwrap();
        gx4.resume().unwrap();

        let fields: Vec<u8> = sent(&gx4).iter().map(|(_, payload)| payload[1]).collect();
        assert_eq!(fields, vec![base::PING, base::IDLE, base::RESUME]);
    }

    #[test]
    fn device_info_is_parsed_from_reply_field() {
        let sim = SimulatedDevice::new(115_200).reply_field(
            BASE_COMMAND,
            base::DEVICE_INFO,
            base::DEVICE_INFO_REPLY,
            &device_info_data(),
        );
        let mut gx4 = attach(sim);

        let info = gx4.device_info().unwrap();
        assert_eq!(info.model_name, "3DM-GX4-25");
        assert_eq!(info.firmware_version, 1102);
    }

    #[test]
    fn missing_reply_field_is_malformed() {
        let mut gx4 = attach(SimulatedDevice::new(115_200));

        let err = gx4.device_info().unwrap_err();
        assert!(matches!(
            err,
            SessionError::MalformedReply {
                descriptor: BASE_COMMAND,
                field: base::DEVICE_INFO_REPLY
            }
        ));
    }

    #[test]
    fn base_rates() {
        let sim = SimulatedDevice::new(115_200)
            .reply_field(DEVICE_COMMAND, device::IMU_BASE_RATE, device::IMU_BASE_RATE_REPLY, &1000u16.to_be_bytes())
            .reply_field(DEVICE_COMMAND, device::FILTER_BASE_RATE, device::FILTER_BASE_RATE_REPLY, &500u16.to_be_bytes());
        let mut gx4 = attach(sim);

        assert_eq!(gx4.imu_base_rate().unwrap(), 1000);
        assert_eq!(gx4.filter_base_rate().unwrap(), 500);
    }

    #[test]
    fn diagnostic_info_round_trips_counters() {
        let sim = SimulatedDevice::new(115_200).reply_field(
            DEVICE_COMMAND,
            device::DEVICE_STATUS,
            device::DEVICE_STATUS_REPLY,
            &diagnostic_data(),
        );
        let mut gx4 = attach(sim);

        let diag = gx4.diagnostic_info().unwrap();
        assert_eq!(diag.model_number, 6234);
        assert_eq!(diag.num_pps_pulses, 42);
    }

    #[test]
    fn invalid_rate_request_sends_nothing() {
        let mut gx4 = attach(SimulatedDevice::new(115_200));

        assert!(matches!(
            gx4.set_imu_data_rate(0, ImuFields::ACCELEROMETER),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(matches!(
            gx4.set_filter_data_rate(10, FilterFields::empty()),
            Err(SessionError::InvalidArgument(_))
        ));
        assert!(sent(&gx4).is_empty());
    }

    #[test]
    fn configuration_commands_use_their_sets() {
        let mut gx4 = attach(SimulatedDevice::new(115_200));
        gx4.set_imu_data_rate(10, ImuFields::ACCELEROMETER | ImuFields::GYROSCOPE)
            .unwrap();
        gx4.set_filter_data_rate(5, FilterFields::QUATERNION).unwrap();
        gx4.enable_measurements(true, false).unwrap();
        gx4.enable_bias_estimation(true).unwrap();
        gx4.set_hard_iron_offset([0.1, -0.2, 0.3]).unwrap();
        gx4.set_soft_iron_matrix([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
            .unwrap();
        gx4.enable_gps_time_sync(true).unwrap();

        let routed: Vec<(u8, u8)> = sent(&gx4).iter().map(|(set, payload)| (*set, payload[1])).collect();
        assert_eq!(
            routed,
            vec![
                (DEVICE_COMMAND, device::IMU_MESSAGE_FORMAT),
                (DEVICE_COMMAND, device::FILTER_MESSAGE_FORMAT),
                (FILTER_COMMAND, filter::ENABLE_MEASUREMENTS),
                (FILTER_COMMAND, filter::CONTROL_FLAGS),
                (FILTER_COMMAND, filter::HARD_IRON_OFFSET),
                (FILTER_COMMAND, filter::SOFT_IRON_MATRIX),
                (DEVICE_COMMAND, device::PPS_SOURCE),
            ]
        );
    }

    #[test]
    fn stream_toggles_select_streams() {
        let mut gx4 = attach(SimulatedDevice::new(115_200));
        gx4.enable_imu_stream(true).unwrap();
        gx4.enable_filter_stream(false).unwrap();

        let payloads: Vec<Vec<u8>> = sent(&gx4).into_iter().map(|(_, payload)| payload).collect();
        assert_eq!(payloads[0][3..], [device::STREAM_IMU, 1]);
        assert_eq!(payloads[1][3..], [device::STREAM_FILTER, 0]);
    }

    #[test]
    fn gps_time_update_sends_week_then_seconds() {
        let mut gx4 = attach(SimulatedDevice::new(115_200));
        gx4.send_gps_time_update(2210, 345_600).unwrap();

        let payloads: Vec<Vec<u8>> = sent(&gx4).into_iter().map(|(_, payload)| payload).collect();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0][2..4], [FUNCTION_APPLY, command::GPS_WEEK]);
        assert_eq!(payloads[1][2..4], [FUNCTION_APPLY, command::GPS_SECONDS]);
        assert_eq!(payloads[1][4..], 345_600u32.to_be_bytes());
    }

    #[test]
    fn nacked_configuration_reports_code() {
        let sim = SimulatedDevice::new(115_200).nack(FILTER_COMMAND, filter::HARD_IRON_OFFSET, 0x04);
        let mut gx4 = attach(sim);

        let err = gx4.set_hard_iron_offset([0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Command {
                descriptor: FILTER_COMMAND,
                code: 0x04,
                ..
            }
        ));
    }

    #[test]
    fn baud_selection_follows_device() {
        let mut gx4 = attach(SimulatedDevice::at_baud(9600, 115_200));
        gx4.set_baud_config(BaudConfig {
            probe_timeout: Duration::from_millis(10),
            ..BaudConfig::default()
        });

        let selection = gx4.select_baud_rate(921_600).unwrap();

        assert_eq!(selection.discovered, 9600);
        assert_eq!(gx4.session().transport().device_baud(), 921_600);
        gx4.ping().unwrap();
    }

    #[test]
    fn streamed_records_reach_observer() {
        let mut sim = SimulatedDevice::new(115_200);
        let mut payload = vec![ImuFields::GYROSCOPE.bits()];
        for rate in [0.01f32, -0.02, 0.03] {
            payload.put_f32(rate);
        }
        sim.queue_frame(IMU_DATA, &payload);
        let mut gx4 = attach(sim);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = Arc::new(move |data: &ImuData| sink.lock().unwrap().push(*data));
        gx4.set_imu_observer(&observer);

        assert_eq!(gx4.run_once(Duration::from_millis(20)).unwrap(), 1);
        assert_eq!(seen.lock().unwrap()[0].gyro(), Some([0.01, -0.02, 0.03]));
    }

    #[test]
    fn disconnect_idles_and_returns_transport() {
        let gx4 = attach(SimulatedDevice::new(115_200));

        let sim = gx4.disconnect();

        let last = sim.commands().last().unwrap();
        assert_eq!(last.payload.as_ref(), &[0x02, base::IDLE]);
    }

    #[test]
    fn disconnect_from_silent_device_still_returns_transport() {
        let gx4 = attach(SimulatedDevice::new(115_200).silent());
        let sim = gx4.disconnect();
        assert!(sim.commands().is_empty());
    }
}
