//! Static Vultr catalog.

use crate::providers::catalog::size;
use crate::providers::traits::{Region, ServerSize};

pub fn regions() -> Vec<Region> {
    vec![
        Region::new("ewr", "New Jersey"),
        Region::new("ord", "Chicago"),
        Region::new("dfw", "Dallas"),
        Region::new("lax", "Los Angeles"),
        Region::new("sea", "Seattle"),
        Region::new("ams", "Amsterdam"),
        Region::new("fra", "Frankfurt"),
        Region::new("lhr", "London"),
        Region::new("nrt", "Tokyo"),
        Region::new("sgp", "Singapore"),
        Region::new("syd", "Sydney"),
    ]
}

pub fn sizes() -> Vec<ServerSize> {
    vec![
        size("vc2-1c-1gb", 1, 1024, 25, "$5.00"),
        size("vc2-1c-2gb", 1, 2048, 55, "$10.00"),
        size("vc2-2c-4gb", 2, 4096, 80, "$20.00"),
        size("vc2-4c-8gb", 4, 8192, 160, "$40.00"),
        size("vc2-6c-16gb", 6, 16384, 320, "$80.00"),
    ]
}
