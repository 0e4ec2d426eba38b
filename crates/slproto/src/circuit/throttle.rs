// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Seven-channel bandwidth throttle negotiated with the simulator on
//! connect. The engine only polices the `resend` channel locally; every
//! other channel is advertised for the simulator to enforce.

/// `(min, max)` bytes/sec per channel, in wire order.
const CHANNEL_RANGES: [(f32, f32); 7] = [
    (10_000.0, 150_000.0), // resend
    (0.0, 170_000.0),      // land
    (0.0, 34_000.0),       // wind
    (0.0, 34_000.0),       // cloud
    (4_000.0, 446_000.0),  // task
    (4_000.0, 446_000.0),  // texture
    (10_000.0, 220_000.0), // asset
];

const DEFAULT_FRACTIONS: [f64; 7] = [0.100, 0.52 / 3.0, 0.05, 0.05, 0.704 / 3.0, 0.704 / 3.0, 0.484 / 3.0];

pub const DEFAULT_TOTAL_BPS: f64 = 1_536_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrottleVector {
    pub resend: f32,
    pub land: f32,
    pub wind: f32,
    pub cloud: f32,
    pub task: f32,
    pub texture: f32,
    pub asset: f32,
}

impl ThrottleVector {
    /// Split `total` bytes/sec across channels by the default fraction
    /// schedule, clamping each channel to its declared range.
    pub fn from_total(total: f64) -> Self {
        let raw: Vec<f32> = DEFAULT_FRACTIONS.iter().map(|f| (total * f) as f32).collect();
        let clamped: Vec<f32> = raw
            .iter()
            .zip(CHANNEL_RANGES.iter())
            .map(|(v, (min, max))| v.clamp(*min, *max))
            .collect();
        Self {
            resend: clamped[0],
            land: clamped[1],
            wind: clamped[2],
            cloud: clamped[3],
            task: clamped[4],
            texture: clamped[5],
            asset: clamped[6],
        }
    }

    fn channels(&self) -> [f32; 7] {
        [self.resend, self.land, self.wind, self.cloud, self.task, self.texture, self.asset]
    }

    /// 28 bytes: seven little-endian f32s, in the order above.
    pub fn to_wire_bytes(&self) -> [u8; 28] {
        let mut out = [0u8; 28];
        for (i, channel) in self.channels().iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&channel.to_le_bytes());
        }
        out
    }

    pub fn from_wire_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 28 {
            return None;
        }
        let mut values = [0f32; 7];
        for (i, slot) in values.iter_mut().enumerate() {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[i * 4..i * 4 + 4]);
            *slot = f32::from_le_bytes(buf);
        }
        Some(Self {
            resend: values[0],
            land: values[1],
            wind: values[2],
            cloud: values[3],
            task: values[4],
            texture: values[5],
            asset: values[6],
        })
    }
}

impl Default for ThrottleVector {
    fn default() -> Self {
        Self::from_total(DEFAULT_TOTAL_BPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_default_total_channel_split() {
        let v = ThrottleVector::from_total(1_536_000.0);
        assert_eq!(v.resend.round() as i64, 153_600);
        assert_eq!(v.land.round() as i64, 266_240);
        assert_eq!(v.wind.round() as i64, 76_800);
        assert_eq!(v.cloud.round() as i64, 76_800);
        assert_eq!(v.task.round() as i64, 360_448);
        assert_eq!(v.texture.round() as i64, 360_448);
        assert_eq!(v.asset.round() as i64, 247_808);
    }

    #[test]
    fn scenario_wire_bytes_begin_with_channel_values() {
        let v = ThrottleVector::from_total(1_536_000.0);
        let wire = v.to_wire_bytes();
        assert_eq!(wire.len(), 28);
        assert_eq!(&wire[0..4], &153_600f32.to_le_bytes());
        assert_eq!(&wire[4..8], &266_240f32.to_le_bytes());
    }

    #[test]
    fn wire_roundtrip() {
        let v = ThrottleVector::from_total(1_536_000.0);
        let wire = v.to_wire_bytes();
        let back = ThrottleVector::from_wire_bytes(&wire).unwrap();
        assert_eq!(back, v);
    }
}
