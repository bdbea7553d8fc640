// omemo-xmpp/stanza
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// `bundle` element per spec.md §6:
//   <bundle xmlns='eu.siacs.conversations.axolotl'>
//     <signedPreKeyPublic signedPreKeyId='…'>…</signedPreKeyPublic>
//     <signedPreKeySignature>…</signedPreKeySignature>
//     <identityKey>…</identityKey>
//     <prekeys><preKeyPublic preKeyId='…'>…</preKeyPublic>…</prekeys>
//   </bundle>
//
// Grounded on prose-xmpp's `mods::omemo::load_device_bundle`/
// `publish_device_bundle`, which move `xmpp_parsers::legacy_omemo::Bundle`
// in and out of pub-sub items; this crate defines its own element shape
// so the `device_id` the bundle was published under (part of the PEP node
// name, not the element itself) stays attached to the parsed value.

use base64::{engine::general_purpose, Engine as _};
use minidom::{Element, NSChoice};

use omemo_core::models::{
    Bundle, PreKeyId, PublicKey, PublicOneTimePreKey, PublicSignedPreKey, SignedPreKeyId,
};

use crate::element_ext::ElementExt;
use crate::ns;

fn omemo_ns_choice() -> NSChoice<'static> {
    NSChoice::AnyOf(&[ns::LEGACY_OMEMO, ns::OMEMO])
}

fn decode_base64(element: &Element) -> anyhow::Result<Box<[u8]>> {
    Ok(general_purpose::STANDARD
        .decode(element.text().trim())?
        .into_boxed_slice())
}

fn encode_base64_child(name: &str, bytes: &[u8]) -> Element {
    Element::builder(name, ns::LEGACY_OMEMO)
        .append(general_purpose::STANDARD.encode(bytes))
        .build()
}

/// Decodes everything except `device_id`, which the caller supplies from
/// the PEP node name the item was fetched from
/// (`eu.siacs.conversations.axolotl.bundles:<device_id>`, per §6).
pub fn decode_bundle(element: &Element, device_id: impl Into<omemo_core::models::DeviceId>) -> anyhow::Result<Bundle> {
    element.expect_is("bundle", omemo_ns_choice())?;

    let signed_pre_key_public = element.req_child("signedPreKeyPublic", element.ns())?;
    let signed_pre_key_id: SignedPreKeyId = signed_pre_key_public
        .req_attr("signedPreKeyId")?
        .parse::<u32>()?
        .into();
    let signed_pre_key_public = decode_base64(signed_pre_key_public)?;

    let signature = decode_base64(element.req_child("signedPreKeySignature", element.ns())?)?;
    let identity_key = decode_base64(element.req_child("identityKey", element.ns())?)?;

    let prekeys_el = element.req_child("prekeys", element.ns())?;
    let mut pre_keys = Vec::new();
    for child in prekeys_el.children() {
        child.expect_is("preKeyPublic", omemo_ns_choice())?;
        let id: PreKeyId = child.req_attr("preKeyId")?.parse::<u32>()?.into();
        let public = PublicKey::from(decode_base64(child)?.as_ref());
        pre_keys.push(PublicOneTimePreKey { id, public });
    }

    Ok(Bundle {
        device_id: device_id.into(),
        identity_key: PublicKey::from(identity_key.as_ref()),
        signed_pre_key: PublicSignedPreKey {
            id: signed_pre_key_id,
            public: PublicKey::from(signed_pre_key_public.as_ref()),
            signature,
        },
        pre_keys,
    })
}

pub fn encode_bundle(bundle: &Bundle) -> Element {
    let signed_pre_key_public = Element::builder("signedPreKeyPublic", ns::LEGACY_OMEMO)
        .attr("signedPreKeyId", u32::from(bundle.signed_pre_key.id))
        .append(general_purpose::STANDARD.encode(bundle.signed_pre_key.public.as_ref()))
        .build();

    let prekeys = bundle.pre_keys.iter().fold(
        Element::builder("prekeys", ns::LEGACY_OMEMO),
        |builder, key| {
            builder.append(
                Element::builder("preKeyPublic", ns::LEGACY_OMEMO)
                    .attr("preKeyId", u32::from(key.id))
                    .append(general_purpose::STANDARD.encode(key.public.as_ref()))
                    .build(),
            )
        },
    );

    Element::builder("bundle", ns::LEGACY_OMEMO)
        .append(signed_pre_key_public)
        .append(encode_base64_child(
            "signedPreKeySignature",
            &bundle.signed_pre_key.signature,
        ))
        .append(encode_base64_child(
            "identityKey",
            bundle.identity_key.as_ref(),
        ))
        .append(prekeys.build())
        .build()
}
