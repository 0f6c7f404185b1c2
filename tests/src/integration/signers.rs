//! # Signers End to End
//!
//! Compositions signed by the seed-phrase signer and by the raw-key store,
//! verified against the public key disclosed in the author definition.

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use shared_crypto::hashing::decode_base64;
    use shared_crypto::{Secp256k1PublicKey, Secp256k1Signature};
    use shared_types::{Author, Unit};
    use unit_composer::adapters::{InMemoryKeyStore, SeedPhraseSigner, WitnessConfig};
    use unit_composer::algorithms::{hash_to_sign, messages};
    use unit_composer::{CompositionKind, CompositionRequest, SignerHandle, UnitComposerApi};

    use crate::integration::fixtures::*;

    const PHRASE: &str =
        "legal winner thank year wave sausage worth useful legal winner thank yellow";

    fn disclosed_pubkey(author: &Author) -> anyhow::Result<Secp256k1PublicKey> {
        let definition = author
            .definition
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("definition not disclosed"))?;
        let text = definition[1]["pubkey"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("not a sig definition"))?;
        let bytes: [u8; 33] = decode_base64(text)?
            .try_into()
            .map_err(|_| anyhow::anyhow!("pubkey is not 33 bytes"))?;
        Ok(Secp256k1PublicKey::from_bytes(bytes)?)
    }

    fn verify_all(unit: &Unit) -> anyhow::Result<()> {
        let hash = hash_to_sign(unit)?;
        for author in &unit.authors {
            let pubkey = disclosed_pubkey(author)?;
            let signature = Secp256k1Signature::from_base64(&author.authentifiers["r"])?;
            pubkey.verify_digest(&hash, &signature)?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_signer_witness_recovery_unit() -> anyhow::Result<()> {
        let witnesses = vec![
            WitnessConfig {
                address: addr('A'),
                definition: None,
                mnemonic_phrase: PHRASE.into(),
                passphrase: String::new(),
                is_change: 0,
                address_index: 0,
            },
            WitnessConfig {
                address: addr('B'),
                definition: None,
                mnemonic_phrase: PHRASE.into(),
                passphrase: String::new(),
                is_change: 0,
                address_index: 1,
            },
        ];
        let signer = Arc::new(SeedPhraseSigner::from_witnesses(&witnesses)?);
        assert_ne!(signer.public_key(&addr('A')), signer.public_key(&addr('B')));

        let svc = service(seeded_ledger(1));
        let composed = svc
            .compose(
                CompositionRequest::new(vec![addr('A'), addr('B')], SignerHandle::Delegated(signer))
                    .with_kind(CompositionKind::Recovery),
            )
            .await?;

        verify_all(&composed.joint.unit)?;
        assert!(composed.joint.ball.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_seed_signer_from_config_file() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"[{{"address": "{}", "mnemonic_phrase": "{}", "is_change": 1, "address_index": 4}}]"#,
            addr('C'),
            PHRASE
        )?;
        let signer = Arc::new(SeedPhraseSigner::from_file(file.path())?);

        let svc = service(seeded_ledger(1));
        let composed = svc
            .compose(
                CompositionRequest::new(vec![addr('C')], SignerHandle::Delegated(signer))
                    .with_message(messages::data(serde_json::json!({"status": "online"}))?),
            )
            .await?;
        verify_all(&composed.joint.unit)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_raw_key_store_composer_signs() -> anyhow::Result<()> {
        let store = Arc::new(InMemoryKeyStore::new());
        store.insert(addr('A'), [0x31; 32])?;
        store.generate(addr('B'))?;

        let svc = service(seeded_ledger(1));
        let composed = svc
            .compose(text_request(
                vec![addr('B'), addr('A')],
                SignerHandle::RawKey(store),
            ))
            .await?;
        verify_all(&composed.joint.unit)?;
        Ok(())
    }

    #[tokio::test]
    async fn test_tampered_unit_fails_verification() -> anyhow::Result<()> {
        let store = Arc::new(InMemoryKeyStore::new());
        store.generate(addr('A'))?;
        let svc = service(seeded_ledger(1));
        let composed = svc
            .compose(text_request(vec![addr('A')], SignerHandle::RawKey(store)))
            .await?;

        let mut unit = composed.joint.unit.clone();
        unit.messages.push(messages::text("appended later")?);
        assert!(verify_all(&unit).is_err());
        Ok(())
    }
}
