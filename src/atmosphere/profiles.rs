//! Standard atmospheric profiles
//!
//! Each profile gives, at 33 altitudes from the ground to 100 km, the
//! pressure (mb), temperature (K), water vapour density (g/m³) and ozone
//! density (g/m³). The tables follow the McClatchey and US 1962 standard
//! atmospheres used in radiative-transfer codes. A 34th level at 99999 km
//! with zero pressure and density closes every profile.

/// Altitudes (km) shared by every standard profile.
pub const ALTITUDES: [f64; 33] = [
    0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
    17.0, 18.0, 19.0, 20.0, 21.0, 22.0, 23.0, 24.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 70.0,
    100.0,
];

/// Altitude (km) of the closing level.
pub const TOP_ALTITUDE: f64 = 99999.0;

/// Column data of one standard profile.
pub struct ProfileTable {
    pub pressure: [f64; 33],
    pub temperature: [f64; 33],
    pub water_vapour: [f64; 33],
    pub ozone: [f64; 33],
}

// Above 15 km every profile shares the same water vapour tail
const STRATOSPHERIC_WATER: [f64; 18] = [
    1.0e-3, 7.6e-4, 6.4e-4, 5.6e-4, 5.0e-4, 4.9e-4, 4.5e-4, 5.1e-4, 5.1e-4, 5.4e-4, 6.0e-4,
    6.7e-4, 3.6e-4, 1.1e-4, 4.3e-5, 1.9e-5, 6.3e-6, 1.4e-7,
];

const fn water(lower: [f64; 14], top: f64) -> [f64; 33] {
    let mut out = [0.0; 33];
    let mut i = 0;
    while i < 14 {
        out[i] = lower[i];
        i += 1;
    }
    while i < 32 {
        out[i] = STRATOSPHERIC_WATER[i - 14];
        i += 1;
    }
    out[32] = top;
    out
}

pub const TROPICAL: ProfileTable = ProfileTable {
    pressure: [
        1013.0, 904.0, 805.0, 715.0, 633.0, 559.0, 492.0, 432.0, 378.0, 329.0, 286.0, 247.0,
        213.0, 182.0, 156.0, 132.0, 111.0, 93.7, 78.9, 66.6, 56.5, 48.0, 40.9, 35.0, 30.0, 25.7,
        12.2, 6.0, 3.05, 1.59, 0.854, 0.0579, 0.0003,
    ],
    temperature: [
        300.0, 294.0, 288.0, 284.0, 277.0, 270.0, 264.0, 257.0, 250.0, 244.0, 237.0, 230.0,
        224.0, 217.0, 210.0, 204.0, 197.0, 195.0, 199.0, 203.0, 207.0, 211.0, 215.0, 217.0,
        219.0, 221.0, 232.0, 243.0, 254.0, 265.0, 270.0, 219.0, 210.0,
    ],
    water_vapour: water(
        [
            19.0, 13.0, 9.3, 4.7, 2.2, 1.5, 0.85, 0.47, 0.25, 0.12, 0.05, 0.017, 0.006, 0.0018,
        ],
        1.0e-9,
    ),
    ozone: [
        5.6e-5, 5.6e-5, 5.4e-5, 5.1e-5, 4.7e-5, 4.5e-5, 4.3e-5, 4.1e-5, 3.9e-5, 3.9e-5, 3.9e-5,
        4.1e-5, 4.3e-5, 4.5e-5, 4.5e-5, 4.7e-5, 4.7e-5, 6.9e-5, 9.0e-5, 1.4e-4, 1.9e-4, 2.4e-4,
        2.8e-4, 3.2e-4, 3.4e-4, 3.4e-4, 2.4e-4, 9.2e-5, 4.1e-5, 1.3e-5, 4.3e-6, 8.6e-8, 4.3e-11,
    ],
};

pub const MIDLATITUDE_SUMMER: ProfileTable = ProfileTable {
    pressure: [
        1013.0, 902.0, 802.0, 710.0, 628.0, 554.0, 487.0, 426.0, 372.0, 324.0, 281.0, 243.0,
        209.0, 179.0, 153.0, 130.0, 111.0, 95.0, 81.2, 69.5, 59.5, 51.0, 43.7, 37.6, 32.2, 27.7,
        13.2, 6.52, 3.33, 1.76, 0.951, 0.0671, 0.0003,
    ],
    temperature: [
        294.0, 290.0, 285.0, 279.0, 273.0, 267.0, 261.0, 255.0, 248.0, 242.0, 235.0, 229.0,
        222.0, 216.0, 216.0, 216.0, 216.0, 216.0, 216.0, 217.0, 218.0, 219.0, 220.0, 222.0,
        223.0, 224.0, 234.0, 245.0, 258.0, 270.0, 276.0, 218.0, 210.0,
    ],
    water_vapour: water(
        [
            14.0, 9.3, 5.9, 3.3, 1.9, 1.0, 0.61, 0.37, 0.21, 0.12, 0.064, 0.022, 0.006, 0.0018,
        ],
        1.0e-9,
    ),
    ozone: [
        6.0e-5, 6.0e-5, 6.0e-5, 6.2e-5, 6.4e-5, 6.6e-5, 6.9e-5, 7.5e-5, 7.9e-5, 8.6e-5, 9.9e-5,
        1.2e-4, 1.5e-4, 1.8e-4, 1.9e-4, 2.1e-4, 2.4e-4, 2.8e-4, 3.2e-4, 3.4e-4, 3.6e-4, 3.6e-4,
        3.4e-4, 3.2e-4, 3.0e-4, 2.8e-4, 2.0e-4, 9.2e-5, 4.1e-5, 1.3e-5, 4.3e-6, 8.6e-8, 4.3e-11,
    ],
};

pub const MIDLATITUDE_WINTER: ProfileTable = ProfileTable {
    pressure: [
        1018.0, 897.3, 789.7, 693.8, 608.1, 531.3, 462.7, 401.6, 347.3, 299.2, 256.8, 219.9,
        188.2, 161.0, 137.8, 117.8, 100.7, 86.1, 73.5, 62.8, 53.7, 45.8, 39.1, 33.4, 28.6, 24.3,
        11.1, 5.18, 2.53, 1.29, 0.682, 0.0467, 0.0003,
    ],
    temperature: [
        272.2, 268.7, 265.2, 261.7, 255.7, 249.7, 243.7, 237.7, 231.7, 225.7, 219.7, 219.2,
        218.7, 218.2, 217.7, 217.2, 216.7, 216.2, 215.7, 215.2, 215.2, 215.2, 215.2, 215.2,
        215.2, 215.2, 217.4, 227.8, 243.2, 258.5, 265.7, 230.7, 210.2,
    ],
    water_vapour: water(
        [
            3.5, 2.5, 1.8, 1.2, 0.66, 0.38, 0.21, 0.085, 0.035, 0.016, 0.0075, 0.0069, 0.006,
            0.0018,
        ],
        1.0e-9,
    ),
    ozone: [
        6.0e-5, 5.4e-5, 4.9e-5, 4.9e-5, 4.9e-5, 5.8e-5, 6.4e-5, 7.7e-5, 9.0e-5, 1.2e-4, 1.6e-4,
        2.1e-4, 2.6e-4, 3.0e-4, 3.2e-4, 3.4e-4, 3.6e-4, 3.9e-4, 4.1e-4, 4.3e-4, 4.5e-4, 4.3e-4,
        4.3e-4, 3.9e-4, 3.6e-4, 3.4e-4, 1.9e-4, 9.2e-5, 4.1e-5, 1.3e-5, 4.3e-6, 8.6e-8, 4.3e-11,
    ],
};

pub const SUBARCTIC_SUMMER: ProfileTable = ProfileTable {
    pressure: [
        1010.0, 896.0, 792.9, 700.0, 616.0, 541.0, 473.0, 413.0, 359.0, 310.7, 267.7, 230.0,
        197.7, 170.0, 146.0, 125.0, 108.0, 92.8, 79.8, 68.6, 58.9, 50.7, 43.6, 37.5, 32.27, 27.8,
        13.4, 6.61, 3.4, 1.81, 0.987, 0.0707, 0.0003,
    ],
    temperature: [
        287.0, 282.0, 276.0, 271.0, 266.0, 260.0, 253.0, 246.0, 239.0, 232.0, 225.0, 225.0,
        225.0, 225.0, 225.0, 225.0, 225.0, 225.0, 225.0, 225.0, 225.0, 225.0, 225.0, 225.0,
        226.0, 228.0, 235.0, 247.0, 262.0, 274.0, 277.0, 216.0, 210.0,
    ],
    water_vapour: water(
        [
            9.1, 6.0, 4.2, 2.7, 1.7, 1.0, 0.54, 0.29, 0.13, 0.042, 0.015, 0.0094, 0.006, 0.0018,
        ],
        1.0e-9,
    ),
    ozone: [
        4.9e-5, 5.4e-5, 5.6e-5, 5.8e-5, 6.0e-5, 6.4e-5, 7.1e-5, 7.5e-5, 7.9e-5, 1.1e-4, 1.3e-4,
        1.8e-4, 2.1e-4, 2.6e-4, 2.8e-4, 3.2e-4, 3.4e-4, 3.9e-4, 4.1e-4, 4.1e-4, 3.9e-4, 3.6e-4,
        3.2e-4, 3.0e-4, 2.8e-4, 2.6e-4, 1.4e-4, 9.2e-5, 4.1e-5, 1.3e-5, 4.3e-6, 8.6e-8, 4.3e-11,
    ],
};

pub const SUBARCTIC_WINTER: ProfileTable = ProfileTable {
    pressure: [
        1013.0, 887.8, 777.5, 679.8, 593.2, 515.8, 446.7, 385.3, 330.8, 282.9, 241.8, 206.7,
        176.6, 151.0, 129.1, 110.3, 94.31, 80.58, 68.82, 58.75, 50.14, 42.77, 36.47, 31.09,
        26.49, 22.56, 10.2, 4.701, 2.243, 1.113, 0.5719, 0.04016, 0.0003,
    ],
    temperature: [
        257.1, 259.1, 255.9, 252.7, 247.7, 240.9, 234.1, 227.3, 220.6, 217.2, 217.2, 217.2,
        217.2, 217.2, 217.2, 217.2, 216.6, 216.0, 215.4, 214.8, 214.1, 213.6, 213.0, 212.4,
        211.8, 211.2, 216.0, 222.2, 234.7, 247.0, 259.3, 245.7, 210.0,
    ],
    water_vapour: water(
        [
            1.2, 1.2, 0.94, 0.68, 0.41, 0.2, 0.098, 0.054, 0.011, 0.0084, 0.0055, 0.0038, 0.0026,
            0.0018,
        ],
        1.0e-9,
    ),
    ozone: [
        4.1e-5, 4.1e-5, 4.1e-5, 4.3e-5, 4.5e-5, 4.7e-5, 4.9e-5, 7.1e-5, 9.0e-5, 1.6e-4, 2.4e-4,
        3.2e-4, 4.3e-4, 4.7e-4, 4.9e-4, 5.6e-4, 6.2e-4, 6.2e-4, 6.2e-4, 6.0e-4, 5.6e-4, 5.1e-4,
        4.7e-4, 4.3e-4, 3.6e-4, 3.2e-4, 1.5e-4, 9.2e-5, 4.1e-5, 1.3e-5, 4.3e-6, 8.6e-8, 4.3e-11,
    ],
};

pub const US62: ProfileTable = ProfileTable {
    pressure: [
        1013.0, 898.6, 795.0, 701.2, 616.6, 540.5, 472.2, 411.1, 356.5, 308.0, 265.0, 227.0,
        194.0, 165.8, 141.7, 121.1, 103.5, 88.5, 75.65, 64.67, 55.29, 47.29, 40.47, 34.67, 29.72,
        25.49, 11.97, 5.746, 2.871, 1.491, 0.7978, 0.0522, 0.0003,
    ],
    temperature: [
        288.1, 281.6, 275.1, 268.7, 262.2, 255.7, 249.2, 242.7, 236.2, 229.7, 223.3, 216.8,
        216.8, 216.8, 216.8, 216.8, 216.8, 216.8, 216.8, 216.8, 216.8, 217.9, 218.9, 219.9,
        220.8, 221.8, 226.5, 236.5, 250.4, 264.2, 270.6, 219.7, 210.0,
    ],
    water_vapour: [
        5.9, 4.2, 2.9, 1.8, 1.1, 0.64, 0.38, 0.21, 0.12, 0.046, 0.018, 0.0082, 0.0037, 0.0018,
        8.4e-4, 7.2e-4, 6.1e-4, 5.2e-4, 4.4e-4, 4.4e-4, 4.4e-4, 4.8e-4, 5.2e-4, 5.7e-4, 6.1e-4,
        6.6e-4, 3.8e-4, 1.6e-4, 6.7e-5, 3.2e-5, 1.2e-5, 1.5e-7, 1.0e-9,
    ],
    ozone: [
        5.4e-5, 5.4e-5, 5.4e-5, 5.0e-5, 4.6e-5, 4.6e-5, 4.5e-5, 4.9e-5, 5.2e-5, 7.1e-5, 9.0e-5,
        1.3e-4, 1.6e-4, 1.7e-4, 1.9e-4, 2.1e-4, 2.4e-4, 2.8e-4, 3.2e-4, 3.5e-4, 3.8e-4, 3.8e-4,
        3.9e-4, 3.8e-4, 3.6e-4, 3.4e-4, 2.0e-4, 1.1e-4, 4.9e-5, 1.7e-5, 4.0e-6, 8.6e-8, 4.3e-11,
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_monotonic_in_pressure() {
        for table in [
            &TROPICAL,
            &MIDLATITUDE_SUMMER,
            &MIDLATITUDE_WINTER,
            &SUBARCTIC_SUMMER,
            &SUBARCTIC_WINTER,
            &US62,
        ] {
            assert!(table.pressure.windows(2).all(|p| p[0] > p[1]));
            assert!(table.temperature.iter().all(|t| *t > 150.0));
            assert!(table.water_vapour.iter().all(|w| *w > 0.0));
        }
        assert!(ALTITUDES.windows(2).all(|z| z[0] < z[1]));
    }

    #[test]
    fn test_stratospheric_water_tail() {
        assert_eq!(TROPICAL.water_vapour[13], 0.0018);
        assert_eq!(TROPICAL.water_vapour[14], 1.0e-3);
        assert_eq!(SUBARCTIC_WINTER.water_vapour[31], 1.4e-7);
    }
}
