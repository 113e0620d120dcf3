use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gx4_session::{Estimate, FilterData, GpsTime, ImuData};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print a flat report: one JSON object, a two-column table, or `key=value` lines.
pub fn print_report<S: Serialize>(value: &S, rows: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, value) in rows {
                table.add_row(vec![key.to_string(), value.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (key, value) in rows {
                println!("{key}={value}");
            }
        }
    }
}

fn print_json<S: Serialize>(value: &S) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

#[derive(Debug, Serialize, PartialEq)]
pub struct GpsTimeOutput {
    time_of_week: f64,
    week: u16,
    status: u16,
}

impl From<GpsTime> for GpsTimeOutput {
    fn from(time: GpsTime) -> Self {
        Self {
            time_of_week: time.time_of_week,
            week: time.week,
            status: time.status,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct EstimateOutput<const N: usize> {
    #[serde(with = "array")]
    value: [f32; N],
    status: u16,
}

impl<const N: usize> From<Estimate<[f32; N]>> for EstimateOutput<N> {
    fn from(estimate: Estimate<[f32; N]>) -> Self {
        Self {
            value: estimate.value,
            status: estimate.status,
        }
    }
}

// serde has no `Serialize` impl for `[T; N]` with a generic `N`.
mod array {
    use serde::Serializer;

    pub fn serialize<S: Serializer, const N: usize>(
        value: &[f32; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(value.iter())
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ImuOutput {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    accel: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gyro: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mag: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pressure: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gps_time: Option<GpsTimeOutput>,
}

impl From<&ImuData> for ImuOutput {
    fn from(data: &ImuData) -> Self {
        Self {
            kind: "imu",
            accel: data.accel(),
            gyro: data.gyro(),
            mag: data.mag(),
            pressure: data.pressure(),
            gps_time: data.gps_time().map(GpsTimeOutput::from),
        }
    }
}

impl ImuOutput {
    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = Vec::new();
        if let Some(accel) = self.accel {
            rows.push(("accel [g]", vector(&accel)));
        }
        if let Some(gyro) = self.gyro {
            rows.push(("gyro [rad/s]", vector(&gyro)));
        }
        if let Some(mag) = self.mag {
            rows.push(("mag [gauss]", vector(&mag)));
        }
        if let Some(pressure) = self.pressure {
            rows.push(("pressure", format!("{pressure:.3}")));
        }
        if let Some(time) = &self.gps_time {
            rows.push(("gps_time", gps(time)));
        }
        rows
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FilterOutput {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    quaternion: Option<EstimateOutput<4>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bias: Option<EstimateOutput<3>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    angle_uncertainty: Option<EstimateOutput<3>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bias_uncertainty: Option<EstimateOutput<3>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gps_time: Option<GpsTimeOutput>,
}

impl From<&FilterData> for FilterOutput {
    fn from(data: &FilterData) -> Self {
        Self {
            kind: "filter",
            quaternion: data.quaternion().map(EstimateOutput::from),
            bias: data.bias().map(EstimateOutput::from),
            angle_uncertainty: data.angle_uncertainty().map(EstimateOutput::from),
            bias_uncertainty: data.bias_uncertainty().map(EstimateOutput::from),
            gps_time: data.gps_time().map(GpsTimeOutput::from),
        }
    }
}

impl FilterOutput {
    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = Vec::new();
        if let Some(q) = &self.quaternion {
            rows.push(("quaternion", estimate(q)));
        }
        if let Some(bias) = &self.bias {
            rows.push(("gyro bias [rad/s]", estimate(bias)));
        }
        if let Some(sigma) = &self.angle_uncertainty {
            rows.push(("angle uncertainty [rad]", estimate(sigma)));
        }
        if let Some(sigma) = &self.bias_uncertainty {
            rows.push(("bias uncertainty [rad/s]", estimate(sigma)));
        }
        if let Some(time) = &self.gps_time {
            rows.push(("gps_time", gps(time)));
        }
        rows
    }
}

pub fn print_imu(data: &ImuData, format: OutputFormat) {
    let out = ImuOutput::from(data);
    print_record(&out, &out.rows(), format);
}

pub fn print_filter(data: &FilterData, format: OutputFormat) {
    let out = FilterOutput::from(data);
    print_record(&out, &out.rows(), format);
}

fn print_record<S: Serialize>(value: &S, rows: &[(&'static str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Pretty => {
            let line: Vec<String> = rows.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("{}", line.join(" "));
        }
        _ => print_report(value, rows, format),
    }
}

fn vector(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:+.5}")).collect();
    format!("[{}]", parts.join(", "))
}

fn estimate<const N: usize>(estimate: &EstimateOutput<N>) -> String {
    format!("{} (status {:#06x})", vector(&estimate.value), estimate.status)
}

fn gps(time: &GpsTimeOutput) -> String {
    format!(
        "week {} tow {:.3}s (status {:#06x})",
        time.week, time.time_of_week, time.status
    )
}
