//! Static `DigitalOcean` catalog.

use crate::providers::catalog::size;
use crate::providers::traits::{Region, ServerSize};

pub fn regions() -> Vec<Region> {
    vec![
        Region::new("nyc1", "New York 1"),
        Region::new("nyc3", "New York 3"),
        Region::new("sfo3", "San Francisco 3"),
        Region::new("ams3", "Amsterdam 3"),
        Region::new("fra1", "Frankfurt 1"),
        Region::new("lon1", "London 1"),
        Region::new("sgp1", "Singapore 1"),
        Region::new("tor1", "Toronto 1"),
        Region::new("blr1", "Bangalore 1"),
        Region::new("syd1", "Sydney 1"),
    ]
}

pub fn sizes() -> Vec<ServerSize> {
    vec![
        size("s-1vcpu-1gb", 1, 1024, 25, "$6.00"),
        size("s-1vcpu-2gb", 1, 2048, 50, "$12.00"),
        size("s-2vcpu-2gb", 2, 2048, 60, "$18.00"),
        size("s-2vcpu-4gb", 2, 4096, 80, "$24.00"),
        size("s-4vcpu-8gb", 4, 8192, 160, "$48.00"),
        size("s-8vcpu-16gb", 8, 16384, 320, "$96.00"),
    ]
}
