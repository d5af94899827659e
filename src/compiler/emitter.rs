//! Module descriptor emission.
//!
//! This file renders each topology node, plus its resolved dependencies
//! and peering flags, into a declarative module descriptor referencing
//! one of the fixed infrastructure templates. Emission is pure and
//! deterministic: identical inputs always serialize to byte-identical
//! output, which callers rely on when retrying a compile request.

use crate::compiler::CompileError;
use crate::config::Settings;
use crate::net::VNetId;
use crate::topology::types::{Node, NodeKind};
use serde::Serialize;
use std::fmt;

/// Strongly-typed module identity.
///
/// Machine modules are keyed by their node id, virtual-network modules
/// by their VNet. Display names are resolved separately, so two nodes
/// of different kinds can never collide through a shared name string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleId {
    Node(String),
    VNet(VNetId),
}

impl ModuleId {
    pub fn node(id: &str) -> ModuleId {
        ModuleId::Node(id.to_string())
    }

    pub fn vnet(vnet: VNetId) -> ModuleId {
        ModuleId::VNet(vnet)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleId::Node(id) => write!(f, "node:{}", id),
            ModuleId::VNet(vnet) => write!(f, "vnet:{}", vnet),
        }
    }
}

/// The fixed infrastructure template library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TemplateKind {
    VirtualNetwork,
    RootDomainController,
    SubDomainController,
    StandaloneServer,
    CertificateAuthority,
    Jumpbox,
}

/// Which VNets the deployment as a whole requires. Every machine module
/// carries these so its template can wire subnet references without
/// re-deriving them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VnetFlags {
    #[serde(rename = "isVNet10Required")]
    pub vnet10: bool,
    #[serde(rename = "isVNet172Required")]
    pub vnet172: bool,
    #[serde(rename = "isVNet192Required")]
    pub vnet192: bool,
}

impl VnetFlags {
    pub fn set(&mut self, vnet: VNetId) {
        match vnet {
            VNetId::V10 => self.vnet10 = true,
            VNetId::V172 => self.vnet172 = true,
            VNetId::V192 => self.vnet192 = true,
        }
    }
}

/// Parameters for a VirtualNetwork module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VnetParams {
    pub location: String,
    #[serde(rename = "vnetName")]
    pub vnet_name: String,
    #[serde(rename = "virtualNetworkAddressPrefix")]
    pub address_prefix: String,
    #[serde(rename = "rootSubnetAddressPrefix")]
    pub subnet_prefix: String,
}

/// Parameters for a RootDomainController module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RootDcParams {
    pub location: String,
    #[serde(rename = "virtualMachineSize")]
    pub vm_size: String,
    #[serde(rename = "virtualMachineHostname")]
    pub hostname: String,
    #[serde(rename = "osDiskType")]
    pub os_disk_type: String,
    #[serde(rename = "privateIPAddress")]
    pub private_ip: String,
    #[serde(rename = "domainName")]
    pub domain_name: String,
    #[serde(rename = "rootDomainNetBIOSName")]
    pub netbios: String,
    #[serde(rename = "enterpriseAdminUsername")]
    pub admin_username: String,
    #[serde(rename = "isRoot")]
    pub is_root: bool,
    #[serde(rename = "hasPublicIP")]
    pub has_public_ip: bool,
    #[serde(rename = "jumpboxPrivateIPAddress")]
    pub jumpbox_ip: String,
    #[serde(rename = "connectedPrivateIPAddress")]
    pub connected_ip: String,
    #[serde(rename = "callerIPAddress")]
    pub caller_ip: String,
    #[serde(flatten)]
    pub vnet_flags: VnetFlags,
}

/// Parameters for a SubDomainController module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubDcParams {
    pub location: String,
    #[serde(rename = "virtualMachineSize")]
    pub vm_size: String,
    #[serde(rename = "virtualMachineHostname")]
    pub hostname: String,
    #[serde(rename = "parentVirtualMachineHostname")]
    pub parent_hostname: String,
    #[serde(rename = "osDiskType")]
    pub os_disk_type: String,
    #[serde(rename = "privateIPAddress")]
    pub private_ip: String,
    #[serde(rename = "domainName")]
    pub domain_name: String,
    #[serde(rename = "rootDomainNetBIOSName")]
    pub netbios: String,
    #[serde(rename = "enterpriseAdminUsername")]
    pub admin_username: String,
    #[serde(rename = "isRoot")]
    pub is_root: bool,
    #[serde(rename = "parentDomainControllerPrivateIp")]
    pub parent_ip: String,
    /// Empty when the parent is the root DC itself
    #[serde(rename = "rootDomainControllerPrivateIp")]
    pub root_ip: String,
    #[serde(rename = "hasPublicIP")]
    pub has_public_ip: bool,
    #[serde(rename = "jumpboxPrivateIPAddress")]
    pub jumpbox_ip: String,
    #[serde(rename = "connectedPrivateIPAddress")]
    pub connected_ip: String,
    #[serde(rename = "callerIPAddress")]
    pub caller_ip: String,
    #[serde(rename = "skipParentPeering")]
    pub skip_parent_peering: bool,
    #[serde(rename = "skipRootPeering")]
    pub skip_root_peering: bool,
    #[serde(flatten)]
    pub vnet_flags: VnetFlags,
}

/// Parameters for a StandaloneServer module (workstations and
/// standalone servers share the template).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerParams {
    pub location: String,
    #[serde(rename = "virtualMachineSize")]
    pub vm_size: String,
    #[serde(rename = "virtualMachineHostname")]
    pub hostname: String,
    #[serde(rename = "osDiskType")]
    pub os_disk_type: String,
    #[serde(rename = "domainName")]
    pub domain_name: String,
    #[serde(rename = "domainControllerPrivateIp")]
    pub dc_ip: String,
    #[serde(rename = "standaloneServerPrivateIp")]
    pub private_ip: String,
    /// Whether the joined domain is the forest root or a sub domain
    #[serde(rename = "rootOrSub")]
    pub root_or_sub: String,
    #[serde(rename = "enterpriseAdminUsername")]
    pub admin_username: String,
    #[serde(rename = "hasPublicIP")]
    pub has_public_ip: bool,
    #[serde(rename = "jumpboxPrivateIPAddress")]
    pub jumpbox_ip: String,
    #[serde(rename = "connectedPrivateIPAddress")]
    pub connected_ip: String,
    #[serde(rename = "callerIPAddress")]
    pub caller_ip: String,
    #[serde(rename = "skipPeering")]
    pub skip_peering: bool,
    #[serde(flatten)]
    pub vnet_flags: VnetFlags,
}

/// Parameters for a CertificateAuthority module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaParams {
    pub location: String,
    #[serde(rename = "virtualMachineSize")]
    pub vm_size: String,
    #[serde(rename = "virtualMachineHostname")]
    pub hostname: String,
    #[serde(rename = "osDiskType")]
    pub os_disk_type: String,
    #[serde(rename = "privateIPAddress")]
    pub private_ip: String,
    #[serde(rename = "rootDomainControllerPrivateIp")]
    pub root_dc_ip: String,
    #[serde(rename = "domainName")]
    pub domain_name: String,
    #[serde(rename = "enterpriseAdminUsername")]
    pub admin_username: String,
    #[serde(rename = "hasPublicIP")]
    pub has_public_ip: bool,
    #[serde(rename = "jumpboxPrivateIPAddress")]
    pub jumpbox_ip: String,
    #[serde(rename = "connectedPrivateIPAddress")]
    pub connected_ip: String,
    #[serde(rename = "callerIPAddress")]
    pub caller_ip: String,
    #[serde(rename = "skipPeering")]
    pub skip_peering: bool,
    #[serde(flatten)]
    pub vnet_flags: VnetFlags,
}

/// Parameters for a Jumpbox module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JumpboxParams {
    pub location: String,
    #[serde(rename = "vmName")]
    pub vm_name: String,
    #[serde(rename = "vmSize")]
    pub vm_size: String,
    #[serde(rename = "osDiskType")]
    pub os_disk_type: String,
    #[serde(rename = "jumpboxPrivateIPAddress")]
    pub private_ip: String,
    #[serde(rename = "connectedPrivateIPAddress")]
    pub connected_ip: String,
    #[serde(rename = "jumpboxAdminUsername")]
    pub admin_username: String,
    #[serde(rename = "kaliSku")]
    pub image_sku: String,
    #[serde(rename = "callerIPAddress")]
    pub caller_ip: String,
    #[serde(flatten)]
    pub vnet_flags: VnetFlags,
}

/// Kind-specific parameter bag of a module descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModuleParams {
    VirtualNetwork(VnetParams),
    RootDomainController(RootDcParams),
    SubDomainController(SubDcParams),
    StandaloneServer(ServerParams),
    CertificateAuthority(CaParams),
    Jumpbox(JumpboxParams),
}

/// One unit of declarative infrastructure output.
///
/// Descriptors are consumed by the external template compiler and
/// deployment engine; any topological ordering of `dependsOn` is a
/// valid execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleDescriptor {
    #[serde(rename = "moduleName")]
    pub module_name: String,
    pub template: TemplateKind,
    pub params: ModuleParams,
    #[serde(rename = "dependsOn")]
    pub depends_on: Vec<String>,
}

/// Shared emission inputs resolved once per compile pass.
pub struct EmitContext<'a> {
    pub settings: &'a Settings,
    pub admin_username: &'a str,
    pub caller_ip: &'a str,
    pub vnet_flags: VnetFlags,
    pub jumpbox_ip: String,
    pub jumpbox_connected_ip: String,
}

impl EmitContext<'_> {
    /// The node's own IP when the jump box connects to it, else empty.
    fn connected_ip_for(&self, node: &Node) -> String {
        if !self.jumpbox_connected_ip.is_empty()
            && node.data.private_ip == self.jumpbox_connected_ip
        {
            node.data.private_ip.clone()
        } else {
            String::new()
        }
    }
}

/// Everything the resolver worked out for one node.
pub struct NodeEmission<'a> {
    pub node: &'a Node,
    /// Resolved parent DC, root fallback already applied
    pub parent: Option<&'a Node>,
    pub root: Option<&'a Node>,
    /// Module display names this module waits on, in resolution order
    pub depends_on: Vec<String>,
    pub skip_parent_peering: bool,
    pub skip_root_peering: bool,
    pub skip_peering: bool,
}

/// Emit the module descriptor for a newly required virtual network.
pub fn emit_vnet(vnet: VNetId, ctx: &EmitContext) -> ModuleDescriptor {
    let template = vnet.template();
    ModuleDescriptor {
        module_name: template.module_name.to_string(),
        template: TemplateKind::VirtualNetwork,
        params: ModuleParams::VirtualNetwork(VnetParams {
            location: ctx.settings.region.clone(),
            vnet_name: template.vnet_name.to_string(),
            address_prefix: template.address_prefix.to_string(),
            subnet_prefix: template.subnet_prefix.to_string(),
        }),
        depends_on: Vec::new(),
    }
}

/// Emit the module descriptor for one machine node.
pub fn emit(emission: &NodeEmission, ctx: &EmitContext) -> Result<ModuleDescriptor, CompileError> {
    let node = emission.node;
    let module_name = required_name(node)?;

    let params = match node.kind {
        NodeKind::DomainController => {
            let domain_name = required_field(node, &node.data.domain_name, "domainName")?;
            let netbios = node.netbios().unwrap_or_default().to_string();
            if let Some(parent) = emission.parent {
                let parent_is_root = emission
                    .root
                    .map(|root| root.id == parent.id)
                    .unwrap_or(false);
                let root_ip = if parent_is_root {
                    String::new()
                } else {
                    emission
                        .root
                        .map(|root| root.data.private_ip.clone())
                        .unwrap_or_default()
                };
                ModuleParams::SubDomainController(SubDcParams {
                    location: ctx.settings.region.clone(),
                    vm_size: ctx.settings.windows_vm_size.clone(),
                    hostname: module_name.clone(),
                    parent_hostname: parent.machine_name().unwrap_or_default().to_string(),
                    os_disk_type: ctx.settings.os_disk_type.clone(),
                    private_ip: node.data.private_ip.clone(),
                    domain_name,
                    netbios,
                    admin_username: ctx.admin_username.to_string(),
                    is_root: false,
                    parent_ip: parent.data.private_ip.clone(),
                    root_ip,
                    has_public_ip: node.has_public_ip(),
                    jumpbox_ip: ctx.jumpbox_ip.clone(),
                    connected_ip: ctx.connected_ip_for(node),
                    caller_ip: ctx.caller_ip.to_string(),
                    skip_parent_peering: emission.skip_parent_peering,
                    skip_root_peering: emission.skip_root_peering,
                    vnet_flags: ctx.vnet_flags,
                })
            } else {
                ModuleParams::RootDomainController(RootDcParams {
                    location: ctx.settings.region.clone(),
                    vm_size: ctx.settings.windows_vm_size.clone(),
                    hostname: module_name.clone(),
                    os_disk_type: ctx.settings.os_disk_type.clone(),
                    private_ip: node.data.private_ip.clone(),
                    domain_name,
                    netbios,
                    admin_username: ctx.admin_username.to_string(),
                    is_root: true,
                    has_public_ip: node.has_public_ip(),
                    jumpbox_ip: ctx.jumpbox_ip.clone(),
                    connected_ip: ctx.connected_ip_for(node),
                    caller_ip: ctx.caller_ip.to_string(),
                    vnet_flags: ctx.vnet_flags,
                })
            }
        }
        NodeKind::Workstation | NodeKind::Standalone => {
            let parent = emission.parent.ok_or_else(|| CompileError::Topology {
                reason: format!("no domain controller resolvable for server '{}'", node.id),
            })?;
            let root_or_sub = if emission
                .root
                .map(|root| root.id == parent.id)
                .unwrap_or(true)
            {
                "root"
            } else {
                "sub"
            };
            ModuleParams::StandaloneServer(ServerParams {
                location: ctx.settings.region.clone(),
                vm_size: ctx.settings.windows_vm_size.clone(),
                hostname: module_name.clone(),
                os_disk_type: ctx.settings.os_disk_type.clone(),
                domain_name: parent.data.domain_name.clone().unwrap_or_default(),
                dc_ip: parent.data.private_ip.clone(),
                private_ip: node.data.private_ip.clone(),
                root_or_sub: root_or_sub.to_string(),
                admin_username: ctx.admin_username.to_string(),
                has_public_ip: node.has_public_ip(),
                jumpbox_ip: ctx.jumpbox_ip.clone(),
                connected_ip: ctx.connected_ip_for(node),
                caller_ip: ctx.caller_ip.to_string(),
                skip_peering: emission.skip_peering,
                vnet_flags: ctx.vnet_flags,
            })
        }
        NodeKind::CertificateAuthority => {
            let parent = emission.parent.ok_or_else(|| CompileError::Topology {
                reason: format!(
                    "no domain controller resolvable for certificate authority '{}'",
                    node.id
                ),
            })?;
            ModuleParams::CertificateAuthority(CaParams {
                location: ctx.settings.region.clone(),
                vm_size: ctx.settings.windows_vm_size.clone(),
                hostname: module_name.clone(),
                os_disk_type: ctx.settings.os_disk_type.clone(),
                private_ip: node.data.private_ip.clone(),
                root_dc_ip: parent.data.private_ip.clone(),
                domain_name: parent.data.domain_name.clone().unwrap_or_default(),
                admin_username: ctx.admin_username.to_string(),
                has_public_ip: node.has_public_ip(),
                jumpbox_ip: ctx.jumpbox_ip.clone(),
                connected_ip: ctx.connected_ip_for(node),
                caller_ip: ctx.caller_ip.to_string(),
                skip_peering: emission.skip_peering,
                vnet_flags: ctx.vnet_flags,
            })
        }
        NodeKind::Jumpbox => ModuleParams::Jumpbox(JumpboxParams {
            location: ctx.settings.region.clone(),
            vm_name: module_name.clone(),
            vm_size: ctx.settings.jumpbox_vm_size.clone(),
            os_disk_type: ctx.settings.os_disk_type.clone(),
            private_ip: node.data.private_ip.clone(),
            connected_ip: ctx.jumpbox_connected_ip.clone(),
            admin_username: ctx.settings.jumpbox_admin_username.clone(),
            image_sku: ctx.settings.jumpbox_image_sku.clone(),
            caller_ip: ctx.caller_ip.to_string(),
            vnet_flags: ctx.vnet_flags,
        }),
    };

    let template = match &params {
        ModuleParams::VirtualNetwork(_) => TemplateKind::VirtualNetwork,
        ModuleParams::RootDomainController(_) => TemplateKind::RootDomainController,
        ModuleParams::SubDomainController(_) => TemplateKind::SubDomainController,
        ModuleParams::StandaloneServer(_) => TemplateKind::StandaloneServer,
        ModuleParams::CertificateAuthority(_) => TemplateKind::CertificateAuthority,
        ModuleParams::Jumpbox(_) => TemplateKind::Jumpbox,
    };

    Ok(ModuleDescriptor {
        module_name,
        template,
        params,
        depends_on: emission.depends_on.clone(),
    })
}

/// The machine name a node's module is published under.
pub fn required_name(node: &Node) -> Result<String, CompileError> {
    let field = match node.kind {
        NodeKind::DomainController => "domainControllerName",
        NodeKind::Workstation | NodeKind::Standalone => "workstationName",
        NodeKind::CertificateAuthority => "caName",
        NodeKind::Jumpbox => return Ok("Jumpbox".to_string()),
    };
    match node.machine_name() {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(CompileError::Validation {
            node_id: node.id.clone(),
            field,
        }),
    }
}

fn required_field(
    node: &Node,
    value: &Option<String>,
    field: &'static str,
) -> Result<String, CompileError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(CompileError::Validation {
            node_id: node.id.clone(),
            field,
        }),
    }
}
