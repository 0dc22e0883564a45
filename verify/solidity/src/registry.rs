use crate::errors::{Result, TemplateError};
use crate::is_identifier;

/// Public signals the registry reads, in circuit order
pub const REGISTRY_SIGNALS: [&str; 3] = ["commitment", "claimedAccuracy", "timestamp"];

/// Companion model registry appended after the verifier.
///
/// The registry checks a proof through the verifier, applies freshness and range
/// rules to the public signals, derives a content-addressed model id and accrues
/// reputation for the registering account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryContract {
    name: String,
    verifier_name: String,
    public_signals: usize,
    pub reputation_reward: u64,
    pub max_accuracy: u64,
    pub freshness_window_secs: u64,
}

impl RegistryContract {
    pub fn new(
        name: impl Into<String>,
        verifier_name: impl Into<String>,
        public_signals: usize,
    ) -> Result<Self> {
        let name = name.into();
        let verifier_name = verifier_name.into();
        for ident in [&name, &verifier_name] {
            if !is_identifier(ident) {
                return Err(TemplateError::InvalidIdentifier(ident.clone()));
            }
        }
        if public_signals < REGISTRY_SIGNALS.len() {
            return Err(TemplateError::TooFewPublicSignals(public_signals));
        }
        Ok(Self {
            name,
            verifier_name,
            public_signals,
            reputation_reward: 10,
            max_accuracy: 100,
            freshness_window_secs: 86_400,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verifier_name(&self) -> &str {
        &self.verifier_name
    }

    pub fn public_signals(&self) -> usize {
        self.public_signals
    }

    /// Index of the commitment signal. Circuit outputs precede public inputs,
    /// so any signals beyond the three the registry reads sit in front.
    pub fn signal_offset(&self) -> usize {
        self.public_signals - REGISTRY_SIGNALS.len()
    }

    /// Render the registry source text
    pub fn render(&self) -> String {
        let offset = self.signal_offset();
        let commitment = offset;
        let accuracy = offset + 1;
        let timestamp = offset + 2;
        let validity_check = if offset > 0 {
            "        require(_pubSignals[0] == 1, \"Circuit rejected the claim\");\n"
        } else {
            ""
        };
        let signal_doc = (0..offset)
            .map(|i| format!("output{i}"))
            .chain(REGISTRY_SIGNALS.iter().map(|s| s.to_string()))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"
// PDM model registry
contract {name} {{
    {verifier} public immutable verifier;
    address public admin;
    bool public paused;

    struct ModelRegistration {{
        bytes32 id;
        uint256 commitment;
        uint256 claimedAccuracy;
        uint256 timestamp;
        address owner;
        bool verified;
        uint256 registrationBlock;
    }}

    mapping(bytes32 => ModelRegistration) public models;
    mapping(uint256 => bool) public usedCommitments;
    mapping(address => bool) public registrars;
    mapping(address => uint256) public userReputations;
    mapping(address => bytes32[]) public userModels;

    uint256 public totalModels;
    uint256 public totalUsers;
    uint256 public totalAccuracy;
    uint256 public constant REPUTATION_REWARD = {reward};
    uint256 public constant MAX_ACCURACY = {max_accuracy};
    uint256 public constant FRESHNESS_WINDOW = {window};

    event ModelRegistered(
        bytes32 indexed modelId,
        address indexed owner,
        uint256 claimedAccuracy,
        uint256 timestamp
    );
    event ModelVerified(bytes32 indexed modelId, bool success);
    event ReputationUpdated(
        address indexed user,
        uint256 oldReputation,
        uint256 newReputation
    );
    event RegistrarUpdated(address indexed account, bool allowed);
    event SystemPaused(address indexed by);
    event SystemUnpaused(address indexed by);

    modifier onlyAdmin() {{
        require(msg.sender == admin, "Only admin");
        _;
    }}

    modifier onlyRegistrar() {{
        require(registrars[msg.sender], "Not a registrar");
        _;
    }}

    modifier whenNotPaused() {{
        require(!paused, "System paused");
        _;
    }}

    constructor(address _verifier) {{
        verifier = {verifier}(_verifier);
        admin = msg.sender;
        registrars[msg.sender] = true;
        emit RegistrarUpdated(msg.sender, true);
    }}

    function setRegistrar(address account, bool allowed) external onlyAdmin {{
        registrars[account] = allowed;
        emit RegistrarUpdated(account, allowed);
    }}

    function pause() external onlyAdmin {{
        require(!paused, "Already paused");
        paused = true;
        emit SystemPaused(msg.sender);
    }}

    function unpause() external onlyAdmin {{
        require(paused, "Not paused");
        paused = false;
        emit SystemUnpaused(msg.sender);
    }}

    function registerModel(
        uint[2] memory _pA,
        uint[2][2] memory _pB,
        uint[2] memory _pC,
        uint[{signals}] memory _pubSignals // [{signal_doc}]
    ) external onlyRegistrar whenNotPaused returns (bytes32) {{
        require(
            verifier.verifyProof(_pA, _pB, _pC, _pubSignals),
            "Invalid ZK proof"
        );
{validity_check}
        uint256 commitment = _pubSignals[{commitment}];
        uint256 claimedAccuracy = _pubSignals[{accuracy}];
        uint256 timestamp = _pubSignals[{timestamp}];

        require(
            timestamp <= block.timestamp &&
            timestamp + FRESHNESS_WINDOW >= block.timestamp,
            "Invalid timestamp"
        );
        require(claimedAccuracy <= MAX_ACCURACY, "Invalid accuracy range");
        require(!usedCommitments[commitment], "Commitment already registered");

        bytes32 modelId = keccak256(abi.encodePacked(
            commitment,
            msg.sender,
            block.number,
            block.timestamp
        ));
        require(!models[modelId].verified, "Model already exists");

        usedCommitments[commitment] = true;
        models[modelId] = ModelRegistration({{
            id: modelId,
            commitment: commitment,
            claimedAccuracy: claimedAccuracy,
            timestamp: timestamp,
            owner: msg.sender,
            verified: true,
            registrationBlock: block.number
        }});

        if (userModels[msg.sender].length == 0) {{
            totalUsers++;
        }}
        userModels[msg.sender].push(modelId);
        totalModels++;
        totalAccuracy += claimedAccuracy;

        uint256 oldReputation = userReputations[msg.sender];
        userReputations[msg.sender] = oldReputation + REPUTATION_REWARD;

        emit ModelRegistered(modelId, msg.sender, claimedAccuracy, timestamp);
        emit ModelVerified(modelId, true);
        emit ReputationUpdated(msg.sender, oldReputation, userReputations[msg.sender]);

        return modelId;
    }}

    function getModel(bytes32 modelId) external view returns (ModelRegistration memory) {{
        require(models[modelId].verified, "Model not found");
        return models[modelId];
    }}

    function getUserModels(address user) external view returns (bytes32[] memory) {{
        return userModels[user];
    }}

    function getReputation(address user) external view returns (uint256) {{
        return userReputations[user];
    }}

    function getSystemStats() external view returns (
        uint256 _totalModels,
        uint256 _totalUsers,
        uint256 _averageAccuracy
    ) {{
        uint256 average = totalModels == 0 ? 0 : totalAccuracy / totalModels;
        return (totalModels, totalUsers, average);
    }}
}}
"#,
            name = self.name,
            verifier = self.verifier_name,
            reward = self.reputation_reward,
            max_accuracy = self.max_accuracy,
            window = self.freshness_window_secs,
            signals = self.public_signals,
            signal_doc = signal_doc,
            validity_check = validity_check,
            commitment = commitment,
            accuracy = accuracy,
            timestamp = timestamp,
        )
    }
}
