mod aerosol;
mod atmosphere;
mod band;
mod brdf;
mod config;
mod driver;
mod environment;
mod error;
mod interp;
mod phase;
mod quadrature;
mod solar;
mod sos;

use config::RunConfig;
use driver::Engine;

const DEFAULT_CONFIG: &str = "./data/config/simple_config.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    println!("Running radiative transfer for {}", path);

    let config = RunConfig::from_file(&path)?;
    let engine = Engine::new(config)?;
    let report = engine.run()?;
    let band = &report.band;

    println!(
        "Spectral range: {:.4} to {:.4} µm (integrated response {:.4})",
        band.range.0, band.range.1, band.response
    );
    println!("  Apparent reflectance: {:.5}", band.apparent_reflectance);
    println!("  Apparent radiance: {:.4} W m−2 sr−1 µm−1", band.radiance);
    println!(
        "  Path / environment / target: {:.5} / {:.5} / {:.5}",
        band.reflectance_parts.diffuse,
        band.reflectance_parts.environment,
        band.reflectance_parts.direct
    );
    println!(
        "  Optical depth (Rayleigh, aerosol): {:.5}, {:.5}",
        band.optical_depth.rayleigh, band.optical_depth.aerosol
    );
    println!(
        "  Transmittance down / up: {:.5} / {:.5}, spherical albedo {:.5}",
        band.down.mixed, band.up.mixed, band.spherical_albedo.mixed
    );
    println!("  Gas transmittance: {:.5}", band.gas.total);
    if let Some(p) = &band.polarization {
        println!(
            "  Polarization: Q = {:.5}, U = {:.5}, degree {:.4}, plane {:.2}°",
            p.reflectance.q,
            p.reflectance.u,
            p.degree(),
            p.plane_angle()
        );
    }
    if let Some(inv) = &report.inversion {
        println!("Atmospheric correction:");
        println!("  Measured reflectance: {:.5}", inv.apparent_reflectance);
        println!("  Ground reflectance: {:.5}", inv.ground_reflectance);
        if let Some(rog) = inv.coupled_reflectance {
            println!("  Coupled ground reflectance: {:.5}", rog);
        }
        let [xa, xb, xc] = inv.coefficients;
        println!("  Coefficients xa, xb, xc: {:.5} {:.5} {:.5}", xa, xb, xc);
    }
    if engine.config().details {
        println!("{}", serde_json::to_string_pretty(&band.details)?);
    }

    Ok(())
}
