//! On-chain account structures for the weighted multisig protocol
//!
//! Every account owned by the multisig program starts with a one-byte type tag followed by the
//! Borsh encoding of its payload. The readers in this module verify ownership, detect closed
//! (all-zero) accounts, check the tag and only then decode the remainder.

use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::{account::Account, pubkey::Pubkey};

use crate::{
    codec,
    error::{MultisigError, MultisigResult},
    instructions::ProposeInstruction,
    types::{GroupMember, ProposedInstruction},
    MAX_MEMBERS,
};

/// Leading tag byte of every multisig-owned account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AccountType {
    Group = 1,
    Proposal = 2,
}

impl AccountType {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

/// Group configuration: weighted members and the approval threshold
///
/// The group account address is derived from the hash of this structure, so two groups with
/// identical members (in the same order) and threshold share an address.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GroupData {
    /// Members with their approval weights; the position of a member is its approval bit
    pub members: Vec<GroupMember>,
    /// Total weight required to execute a proposal
    pub threshold: u32,
}

impl GroupData {
    pub fn new(members: Vec<GroupMember>, threshold: u32) -> Self {
        Self { members, threshold }
    }

    /// Parse a `pubkey:weight,pubkey:weight` member list and validate the resulting group
    ///
    /// # Arguments
    /// * `list` - Comma separated members, each a base58 key and a decimal weight
    /// * `threshold` - Approval threshold of the group
    pub fn from_member_list(list: &str, threshold: u32) -> MultisigResult<Self> {
        let members = list
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(parse_member)
            .collect::<MultisigResult<Vec<_>>>()?;

        let group = Self::new(members, threshold);
        group.validate()?;
        Ok(group)
    }

    /// Check the rules the program enforces when a group is initialized
    pub fn validate(&self) -> MultisigResult<()> {
        if self.threshold == 0 {
            return Err(MultisigError::ZeroThreshold);
        }
        if self.members.is_empty() {
            return Err(MultisigError::NoMembers);
        }
        if self.members.len() > MAX_MEMBERS {
            return Err(MultisigError::TooManyMembers(self.members.len()));
        }
        if self.members.iter().any(|m| m.weight == 0) {
            return Err(MultisigError::ZeroWeight);
        }

        let total_weight = self.total_weight();
        if total_weight < self.threshold {
            return Err(MultisigError::UnreachableThreshold {
                threshold: self.threshold,
                total_weight,
            });
        }
        Ok(())
    }

    /// Sum of all member weights, saturating like the program's tally
    pub fn total_weight(&self) -> u32 {
        self.members
            .iter()
            .fold(0u32, |acc, m| acc.saturating_add(m.weight))
    }

    /// Position and weight of `key` in the member list
    pub fn member_weight(&self, key: &Pubkey) -> Option<(usize, u32)> {
        self.members
            .iter()
            .enumerate()
            .find(|(_, member)| &member.public_key == key)
            .map(|(idx, member)| (idx, member.weight))
    }

    pub fn is_member(&self, key: &Pubkey) -> bool {
        self.member_weight(key).is_some()
    }

    /// Whether a proposal by `author` is executed right away without creating a proposal account
    pub fn executes_immediately(&self, author: &Pubkey) -> bool {
        self.member_weight(author)
            .is_some_and(|(_, weight)| weight >= self.threshold)
    }

    /// Size of the group account: the tag byte plus the encoded group
    pub fn account_space(&self) -> MultisigResult<usize> {
        Ok(codec::encoded_len(self)? + 1)
    }
}

fn parse_member(item: &str) -> MultisigResult<GroupMember> {
    let (key, weight) = item.split_once(':').ok_or_else(|| {
        MultisigError::InvalidArgument(format!("member `{item}` is not key:weight"))
    })?;

    let public_key = Pubkey::from_str(key.trim())
        .map_err(|e| MultisigError::InvalidArgument(format!("member key `{key}`: {e}")))?;
    let weight = weight
        .trim()
        .parse::<u32>()
        .map_err(|e| MultisigError::InvalidArgument(format!("member weight `{weight}`: {e}")))?;

    Ok(GroupMember::new(public_key, weight))
}

/// Immutable part of a proposal; its hash (salt included) seeds the proposal address
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposalConfig {
    /// Group the proposal belongs to
    pub group: Pubkey,
    /// Instructions executed once the threshold is reached
    pub instructions: Vec<ProposedInstruction>,
    /// Member that created the proposal
    pub author: Pubkey,
    /// Caller-chosen value that keeps otherwise identical proposals apart
    pub salt: u64,
}

impl ProposalConfig {
    /// Config the program will store for a propose instruction sent by `author`
    pub fn new(group: Pubkey, author: Pubkey, propose: &ProposeInstruction) -> Self {
        Self {
            group,
            instructions: propose.instructions.clone(),
            author,
            salt: propose.salt,
        }
    }

    /// Size to budget rent for when this proposal is stored: tag, encoded proposal and a
    /// four-byte margin
    pub fn account_space(&self) -> MultisigResult<usize> {
        let data = ProposalData {
            config: self.clone(),
            state: ProposalState::default(),
        };
        Ok(codec::encoded_len(&data)? + 4 + 1)
    }
}

/// Mutable approval tally of a proposal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposalState {
    /// Bit `i` is set once the member at index `i` of the group has approved
    pub members: u64,
    /// Sum of the weights of approving members
    pub current_weight: u32,
}

impl ProposalState {
    /// Whether the member at `idx` has approved
    pub fn is_approved_by(&self, idx: usize) -> bool {
        idx < MAX_MEMBERS && self.members & (1u64 << idx) != 0
    }

    /// Number of members that have approved
    pub fn approvals(&self) -> u32 {
        self.members.count_ones()
    }

    /// Whether the accumulated weight reaches the group's threshold
    pub fn meets_threshold(&self, group: &GroupData) -> bool {
        self.current_weight >= group.threshold
    }
}

/// A pending proposal as stored on chain
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProposalData {
    pub config: ProposalConfig,
    pub state: ProposalState,
}

impl ProposalData {
    /// Members of `group` that have approved this proposal so far
    pub fn approvers<'a>(&self, group: &'a GroupData) -> Vec<&'a GroupMember> {
        group
            .members
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.state.is_approved_by(*idx))
            .map(|(_, member)| member)
            .collect()
    }
}

/// Verify the tag of raw account data and decode the payload behind it
///
/// All-zero data (including empty data) means the account was closed or finalized and yields
/// [`MultisigError::EmptyAccountData`] rather than a decode error.
pub fn read_tagged<T: BorshDeserialize>(
    data: &[u8],
    account_type: AccountType,
) -> MultisigResult<T> {
    if data.iter().all(|b| *b == 0) {
        return Err(MultisigError::EmptyAccountData);
    }

    let actual = data[0];
    if actual != account_type.tag() {
        return Err(MultisigError::InvalidAccountType {
            expected: account_type.tag(),
            actual,
        });
    }

    codec::decode(&data[1..])
}

fn check_owner(account: &Account, program_id: &Pubkey) -> MultisigResult<()> {
    if account.owner != *program_id {
        return Err(MultisigError::InvalidAccountOwner {
            expected: *program_id,
            actual: account.owner,
        });
    }
    Ok(())
}

/// Read a group account fetched from the chain
pub fn read_group_account(account: &Account, program_id: &Pubkey) -> MultisigResult<GroupData> {
    check_owner(account, program_id)?;
    read_tagged(&account.data, AccountType::Group)
}

/// Read a proposal account fetched from the chain
pub fn read_proposal_account(
    account: &Account,
    program_id: &Pubkey,
) -> MultisigResult<ProposalData> {
    check_owner(account, program_id)?;
    read_tagged(&account.data, AccountType::Proposal)
}

/// Bytes matched at offset 0 when scanning the program for group accounts
pub fn group_filter_bytes() -> Vec<u8> {
    vec![AccountType::Group.tag()]
}

/// Bytes matched at offset 0 when scanning the program for proposals of `group`
pub fn proposal_filter_bytes(group: &Pubkey) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(33);
    bytes.push(AccountType::Proposal.tag());
    bytes.extend_from_slice(group.as_ref());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProposedAccountMeta;

    fn two_member_group() -> (GroupData, Pubkey, Pubkey) {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let group = GroupData::new(
            vec![GroupMember::new(alice, 1), GroupMember::new(bob, 1)],
            2,
        );
        (group, alice, bob)
    }

    fn tagged(tag: AccountType, payload: &impl BorshSerialize) -> Vec<u8> {
        let mut data = vec![tag.tag()];
        data.extend(codec::encode(payload).unwrap());
        data
    }

    fn account(owner: Pubkey, data: Vec<u8>) -> Account {
        Account {
            lamports: 1_000_000,
            data,
            owner,
            executable: false,
            rent_epoch: 0,
        }
    }

    #[test]
    fn test_group_validation() {
        let (group, alice, _) = two_member_group();
        assert!(group.validate().is_ok());
        assert_eq!(group.total_weight(), 2);
        assert_eq!(group.member_weight(&alice), Some((0, 1)));
        assert!(!group.executes_immediately(&alice));

        let mut zero = group.clone();
        zero.threshold = 0;
        assert!(matches!(zero.validate(), Err(MultisigError::ZeroThreshold)));

        let empty = GroupData::new(vec![], 1);
        assert!(matches!(empty.validate(), Err(MultisigError::NoMembers)));

        let mut weightless = group.clone();
        weightless.members[1].weight = 0;
        assert!(matches!(weightless.validate(), Err(MultisigError::ZeroWeight)));

        let mut unreachable = group.clone();
        unreachable.threshold = 3;
        assert!(matches!(
            unreachable.validate(),
            Err(MultisigError::UnreachableThreshold {
                threshold: 3,
                total_weight: 2
            })
        ));

        let crowded = GroupData::new(
            (0..=MAX_MEMBERS)
                .map(|_| GroupMember::new(Pubkey::new_unique(), 1))
                .collect(),
            1,
        );
        assert!(matches!(
            crowded.validate(),
            Err(MultisigError::TooManyMembers(65))
        ));
    }

    #[test]
    fn test_member_list_parsing() {
        let alice = Pubkey::new_unique();
        let bob = Pubkey::new_unique();
        let list = format!("{alice}:3, {bob}:1");

        let group = GroupData::from_member_list(&list, 3).unwrap();
        assert_eq!(
            group.members,
            vec![GroupMember::new(alice, 3), GroupMember::new(bob, 1)]
        );
        assert!(group.executes_immediately(&alice));
        assert!(!group.executes_immediately(&bob));

        let err = GroupData::from_member_list(&format!("{alice}"), 1).unwrap_err();
        assert!(err.is_usage_error());
        let err = GroupData::from_member_list(&format!("{alice}:heavy"), 1).unwrap_err();
        assert!(err.is_usage_error());
        let err = GroupData::from_member_list("not-a-key:1", 1).unwrap_err();
        assert!(err.is_usage_error());
        let err = GroupData::from_member_list("", 1).unwrap_err();
        assert!(matches!(err, MultisigError::NoMembers));
    }

    #[test]
    fn test_group_account_space() {
        let (group, _, _) = two_member_group();
        // tag + u32 len + 2 * (32 + 4) + u32 threshold
        assert_eq!(group.account_space().unwrap(), 1 + 4 + 2 * 36 + 4);
    }

    #[test]
    fn test_proposal_account_space() {
        let (_, alice, _) = two_member_group();
        let config = ProposalConfig {
            group: Pubkey::new_unique(),
            instructions: vec![ProposedInstruction {
                program_id: Pubkey::new_unique(),
                accounts: vec![
                    ProposedAccountMeta {
                        pubkey: Pubkey::new_unique(),
                        is_signer: true,
                        is_writable: true,
                    },
                    ProposedAccountMeta {
                        pubkey: alice,
                        is_signer: false,
                        is_writable: false,
                    },
                ],
                data: vec![1, 2, 3],
            }],
            author: alice,
            salt: 42,
        };
        let data = ProposalData {
            config: config.clone(),
            state: ProposalState::default(),
        };

        let space = config.account_space().unwrap();
        assert_eq!(space, 1 + 4 + codec::encoded_len(&data).unwrap());
        // group + vec len + (program + len + 2 * 34 + len + 3) + author + salt + state
        assert_eq!(
            codec::encoded_len(&data).unwrap(),
            32 + 4 + (32 + 4 + 2 * 34 + 4 + 3) + 32 + 8 + 8 + 4
        );
        assert_eq!(space, 204);

        // approvals do not change the encoded size
        let approved = ProposalData {
            config,
            state: ProposalState {
                members: 0b11,
                current_weight: 2,
            },
        };
        assert_eq!(codec::encoded_len(&approved).unwrap() + 5, space);
    }

    #[test]
    fn test_read_group_account() {
        let program_id = Pubkey::new_unique();
        let (group, _, _) = two_member_group();

        let read = read_group_account(
            &account(program_id, tagged(AccountType::Group, &group)),
            &program_id,
        )
        .unwrap();
        assert_eq!(read, group);
    }

    #[test]
    fn test_reader_rejects_wrong_owner() {
        let program_id = Pubkey::new_unique();
        let other = Pubkey::new_unique();
        let (group, _, _) = two_member_group();

        let foreign = account(other, tagged(AccountType::Group, &group));
        let err = read_group_account(&foreign, &program_id).unwrap_err();
        assert!(matches!(
            err,
            MultisigError::InvalidAccountOwner { expected, actual }
                if expected == program_id && actual == other
        ));
    }

    #[test]
    fn test_tag_verification_both_ways() {
        let program_id = Pubkey::new_unique();
        let (group, alice, _) = two_member_group();
        let proposal = ProposalData {
            config: ProposalConfig {
                group: Pubkey::new_unique(),
                instructions: vec![],
                author: alice,
                salt: 7,
            },
            state: ProposalState {
                members: 1,
                current_weight: 1,
            },
        };

        let group_account = account(program_id, tagged(AccountType::Group, &group));
        let proposal_account = account(program_id, tagged(AccountType::Proposal, &proposal));

        assert!(matches!(
            read_proposal_account(&group_account, &program_id),
            Err(MultisigError::InvalidAccountType {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            read_group_account(&proposal_account, &program_id),
            Err(MultisigError::InvalidAccountType {
                expected: 1,
                actual: 2
            })
        ));
        assert_eq!(
            read_proposal_account(&proposal_account, &program_id).unwrap(),
            proposal
        );
    }

    #[test]
    fn test_closed_account_reads_as_empty() {
        let program_id = Pubkey::new_unique();

        let zeroed = account(program_id, vec![0u8; 256]);
        let err = read_proposal_account(&zeroed, &program_id).unwrap_err();
        assert!(err.is_closed_account());

        let drained = account(program_id, vec![]);
        let err = read_group_account(&drained, &program_id).unwrap_err();
        assert!(err.is_closed_account());
    }

    #[test]
    fn test_corrupted_payload_is_decode_error() {
        let program_id = Pubkey::new_unique();
        let err = read_group_account(&account(program_id, vec![1, 5, 0]), &program_id).unwrap_err();
        assert!(matches!(err, MultisigError::DeserializationError(_)));
        assert!(!err.is_closed_account());
    }

    #[test]
    fn test_proposal_approvals() {
        let (group, alice, bob) = two_member_group();
        let proposal = ProposalData {
            config: ProposalConfig {
                group: Pubkey::new_unique(),
                instructions: vec![],
                author: bob,
                salt: 0,
            },
            state: ProposalState {
                members: 0b10,
                current_weight: 1,
            },
        };

        assert!(!proposal.state.is_approved_by(0));
        assert!(proposal.state.is_approved_by(1));
        assert!(!proposal.state.is_approved_by(MAX_MEMBERS));
        assert_eq!(proposal.state.approvals(), 1);
        assert!(!proposal.state.meets_threshold(&group));

        let approvers = proposal.approvers(&group);
        assert_eq!(approvers.len(), 1);
        assert_eq!(approvers[0].public_key, bob);
        assert_ne!(approvers[0].public_key, alice);
    }

    #[test]
    fn test_filter_bytes() {
        let group = Pubkey::new_unique();
        assert_eq!(group_filter_bytes(), vec![1]);

        let filter = proposal_filter_bytes(&group);
        assert_eq!(filter.len(), 33);
        assert_eq!(filter[0], 2);
        assert_eq!(&filter[1..], group.as_ref());
    }
}
