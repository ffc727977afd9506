//! Cloud-facing machine settings
//!
//! These values are handed to the provisioning layer untouched; the engine
//! only layers them (server over facet over cluster).

use crate::error::ClusterError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Supported cloud providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Ec2,
    Vsphere,
    Static,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ec2 => "ec2",
            Self::Vsphere => "vsphere",
            Self::Static => "static",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ec2" => Ok(Self::Ec2),
            "vsphere" => Ok(Self::Vsphere),
            "static" => Ok(Self::Static),
            _ => Err(ClusterError::UnknownProvider(s.to_string())),
        }
    }
}

/// Inbound port range opened by a security group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_cidr")]
    pub cidr: String,
}

impl PortRange {
    pub fn tcp(from: u16, to: u16) -> Self {
        Self {
            from,
            to,
            protocol: default_protocol(),
            cidr: default_cidr(),
        }
    }
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_cidr() -> String {
    "0.0.0.0/0".to_string()
}

/// A named security group; the name is the key it is stored under
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub authorized_groups: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub authorized_ports: BTreeSet<PortRange>,
}

impl SecurityGroup {
    /// Let members of `group` reach machines in this group
    pub fn authorize_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.authorized_groups.insert(group.into());
        self
    }

    /// Open a TCP port range to the world
    pub fn authorize_port_range(&mut self, from: u16, to: u16) -> &mut Self {
        self.authorized_ports.insert(PortRange::tcp(from, to));
        self
    }

    pub fn describe(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Union of both groups' permissions
    pub fn absorb(&mut self, other: &SecurityGroup) {
        if self.description.is_none() {
            self.description = other.description.clone();
        }
        self.authorized_groups
            .extend(other.authorized_groups.iter().cloned());
        self.authorized_ports
            .extend(other.authorized_ports.iter().cloned());
    }
}

/// Cloud settings of one cluster, facet or server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypair: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub security_groups: BTreeMap<String, SecurityGroup>,
}

impl CloudSettings {
    pub fn flavor(&mut self, flavor: impl Into<String>) -> &mut Self {
        self.flavor = Some(flavor.into());
        self
    }

    pub fn image_name(&mut self, image: impl Into<String>) -> &mut Self {
        self.image_name = Some(image.into());
        self
    }

    pub fn bits(&mut self, bits: impl Into<String>) -> &mut Self {
        self.bits = Some(bits.into());
        self
    }

    pub fn region(&mut self, region: impl Into<String>) -> &mut Self {
        self.region = Some(region.into());
        self
    }

    pub fn availability_zones<I, S>(&mut self, zones: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.availability_zones = zones.into_iter().map(Into::into).collect();
        self
    }

    pub fn keypair(&mut self, keypair: impl Into<String>) -> &mut Self {
        self.keypair = Some(keypair.into());
        self
    }

    pub fn public_ip(&mut self, ip: impl Into<String>) -> &mut Self {
        self.public_ip = Some(ip.into());
        self
    }

    /// Named security group, created on first use
    pub fn security_group(&mut self, name: impl Into<String>) -> &mut SecurityGroup {
        self.security_groups.entry(name.into()).or_default()
    }

    /// Fill fields unset here from `parent`. Security groups defined on
    /// both sides keep this level's definition.
    pub fn reverse_merge(&mut self, parent: &CloudSettings) {
        fill(&mut self.flavor, &parent.flavor);
        fill(&mut self.image_name, &parent.image_name);
        fill(&mut self.bits, &parent.bits);
        fill(&mut self.region, &parent.region);
        fill(&mut self.keypair, &parent.keypair);
        fill(&mut self.public_ip, &parent.public_ip);
        if self.availability_zones.is_empty() {
            self.availability_zones = parent.availability_zones.clone();
        }
        for (name, group) in &parent.security_groups {
            self.security_groups
                .entry(name.clone())
                .or_insert_with(|| group.clone());
        }
    }

    /// Copy every field set in `overrides` over this one
    pub fn overlay(&mut self, overrides: &CloudSettings) {
        replace(&mut self.flavor, &overrides.flavor);
        replace(&mut self.image_name, &overrides.image_name);
        replace(&mut self.bits, &overrides.bits);
        replace(&mut self.region, &overrides.region);
        replace(&mut self.keypair, &overrides.keypair);
        replace(&mut self.public_ip, &overrides.public_ip);
        if !overrides.availability_zones.is_empty() {
            self.availability_zones = overrides.availability_zones.clone();
        }
        for (name, group) in &overrides.security_groups {
            self.security_group(name.clone()).absorb(group);
        }
    }
}

fn fill(target: &mut Option<String>, source: &Option<String>) {
    if target.is_none() {
        target.clone_from(source);
    }
}

fn replace(target: &mut Option<String>, source: &Option<String>) {
    if source.is_some() {
        target.clone_from(source);
    }
}
