//! The set of registries a BGP session decodes and encodes with.
//!
//! A [`BgpExtensions`] is built once, typically via `default()`, optionally
//! extended with additional handlers and then shared between all sessions,
//! usually behind an [`Arc`](std::sync::Arc). Each call into the codec
//! pairs it with the [`SessionConfig`] of the session at hand in a
//! [`CodecContext`].

use crate::bgp::communities::{self, ExtCommunityRegistry};
use crate::bgp::linkstate::{self, LinkStateTlv, LsDescriptor};
use crate::bgp::message::{self, MessageRegistry, SessionConfig};
use crate::bgp::message::open::{self, CapabilityRegistry};
use crate::bgp::nlri::{self, NlriRegistry};
use crate::bgp::path_attributes::{self, AttributeRegistry};
use crate::bgp::types::{AFI, SAFI};
use crate::tlv::TlvRegistry;

use log::error;

//------------ BgpExtensions -------------------------------------------------

#[derive(Clone, Debug)]
pub struct BgpExtensions {
    messages: MessageRegistry,
    attributes: AttributeRegistry,
    ext_communities: ExtCommunityRegistry,
    nlri: NlriRegistry,
    capabilities: CapabilityRegistry,
    ls_descriptors: TlvRegistry<LsDescriptor>,
    ls_attributes: TlvRegistry<LinkStateTlv>,
}

impl BgpExtensions {
    /// Creates a set of empty registries.
    ///
    /// Nothing at all can be parsed with these until handlers are added.
    pub fn new() -> Self {
        BgpExtensions {
            messages: MessageRegistry::new(),
            attributes: AttributeRegistry::new(),
            ext_communities: ExtCommunityRegistry::new(),
            nlri: NlriRegistry::new(),
            capabilities: CapabilityRegistry::new(),
            ls_descriptors: TlvRegistry::new(),
            ls_attributes: TlvRegistry::new(),
        }
    }

    pub fn messages(&self) -> &MessageRegistry {
        &self.messages
    }

    pub fn messages_mut(&mut self) -> &mut MessageRegistry {
        &mut self.messages
    }

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeRegistry {
        &mut self.attributes
    }

    pub fn ext_communities(&self) -> &ExtCommunityRegistry {
        &self.ext_communities
    }

    pub fn ext_communities_mut(&mut self) -> &mut ExtCommunityRegistry {
        &mut self.ext_communities
    }

    pub fn nlri(&self) -> &NlriRegistry {
        &self.nlri
    }

    pub fn nlri_mut(&mut self) -> &mut NlriRegistry {
        &mut self.nlri
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn capabilities_mut(&mut self) -> &mut CapabilityRegistry {
        &mut self.capabilities
    }

    /// Node, link and prefix descriptor TLVs of link-state NLRI.
    pub fn ls_descriptors(&self) -> &TlvRegistry<LsDescriptor> {
        &self.ls_descriptors
    }

    pub fn ls_descriptors_mut(&mut self) -> &mut TlvRegistry<LsDescriptor> {
        &mut self.ls_descriptors
    }

    /// TLVs of the BGP-LS path attribute.
    pub fn ls_attributes(&self) -> &TlvRegistry<LinkStateTlv> {
        &self.ls_attributes
    }

    pub fn ls_attributes_mut(&mut self) -> &mut TlvRegistry<LinkStateTlv> {
        &mut self.ls_attributes
    }
}

impl Default for BgpExtensions {
    /// Creates registries holding all the built-in handlers.
    fn default() -> Self {
        let mut res = Self::new();
        message::register_defaults(&mut res.messages);
        path_attributes::register_defaults(&mut res.attributes);
        communities::register_defaults(&mut res.ext_communities);
        nlri::register_defaults(&mut res.nlri);
        if let Err(err) = res.nlri.register(
            (AFI::LinkState, SAFI::LinkState),
            (AFI::LinkState, SAFI::LinkState),
            linkstate::parse_nlris,
            linkstate::compose_nlris,
        ) {
            error!("failed to register link-state NLRI: {}", err);
        }
        open::register_defaults(&mut res.capabilities);
        linkstate::register_descriptor_defaults(&mut res.ls_descriptors);
        linkstate::register_attribute_defaults(&mut res.ls_attributes);
        res
    }
}

//------------ CodecContext --------------------------------------------------

/// Everything a parser needs besides the octets themselves.
#[derive(Clone, Copy, Debug)]
pub struct CodecContext<'a> {
    pub config: &'a SessionConfig,
    pub extensions: &'a BgpExtensions,
}

impl<'a> CodecContext<'a> {
    pub fn new(
        config: &'a SessionConfig,
        extensions: &'a BgpExtensions,
    ) -> Self {
        CodecContext { config, extensions }
    }
}

//--- Tests ------------------------------------------------------------------
